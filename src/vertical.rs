use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the five data products the dashboard exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalId {
    Fintech,
    AiTalent,
    Esg,
    Regulatory,
    SupplyChain,
}

impl VerticalId {
    pub const ALL: [VerticalId; 5] = [
        VerticalId::Fintech,
        VerticalId::AiTalent,
        VerticalId::Esg,
        VerticalId::Regulatory,
        VerticalId::SupplyChain,
    ];

    /// Path segment used by the backend API.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalId::Fintech => "fintech",
            VerticalId::AiTalent => "ai_talent",
            VerticalId::Esg => "esg",
            VerticalId::Regulatory => "regulatory",
            VerticalId::SupplyChain => "supply_chain",
        }
    }

    pub fn profile(&self) -> &'static VerticalProfile {
        match self {
            VerticalId::Fintech => &FINTECH,
            VerticalId::AiTalent => &AI_TALENT,
            VerticalId::Esg => &ESG,
            VerticalId::Regulatory => &REGULATORY,
            VerticalId::SupplyChain => &SUPPLY_CHAIN,
        }
    }
}

impl fmt::Display for VerticalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vertical: {0}")]
pub struct UnknownVertical(pub String);

impl FromStr for VerticalId {
    type Err = UnknownVertical;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VerticalId::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| UnknownVertical(s.to_string()))
    }
}

/// Static presentation copy for a vertical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerticalProfile {
    pub title: &'static str,
    pub tagline: &'static str,
    pub accent: &'static str,
    pub sources: [&'static str; 3],
    pub algo_name: &'static str,
    pub algo_formula: &'static str,
}

static FINTECH: VerticalProfile = VerticalProfile {
    title: "Fintech Growth Intelligence",
    tagline: "Predicting funding rounds and valuation shifts before they happen.",
    accent: "blue",
    sources: ["App Store Metrics", "User Sentiment", "Hiring Signals"],
    algo_name: "Funding Probability Score",
    algo_formula: "Score = (Hiring × 0.3) + (Downloads × 0.25) + (Sentiment × 0.2)",
};

static AI_TALENT: VerticalProfile = VerticalProfile {
    title: "AI Talent & Capital Prediction",
    tagline: "Tracking engineer migration to predict model breakthroughs.",
    accent: "indigo",
    sources: ["GitHub Activity", "Research Output", "Talent Flow"],
    algo_name: "Technical Momentum Index",
    algo_formula: "Index = Σ(Citations × Impact) / Time_Decay",
};

static ESG: VerticalProfile = VerticalProfile {
    title: "ESG Impact & Greenwashing Detector",
    tagline: "Quantifying the gap between corporate claims and reality.",
    accent: "emerald",
    sources: ["Corporate Claims", "Satellite Emissions", "News Sentiment"],
    algo_name: "Greenwashing Risk Score",
    algo_formula: "Risk = |Claimed − Observed| / Claimed × Sentiment_Weight",
};

static REGULATORY: VerticalProfile = VerticalProfile {
    title: "Regulatory Compliance Prediction",
    tagline: "Forecasting enforcement actions and fine probabilities.",
    accent: "red",
    sources: ["Enforcement Filings", "Complaint Volume", "Policy Drafts"],
    algo_name: "Enforcement Probability",
    algo_formula: "P = Complaints × 0.4 + Precedent × 0.35 + Exposure × 0.25",
};

static SUPPLY_CHAIN: VerticalProfile = VerticalProfile {
    title: "Supply Chain Resilience Intelligence",
    tagline: "Predicting disruption risks and recovery timelines.",
    accent: "amber",
    sources: ["Port Congestion", "Shipping Rates", "Supplier Health"],
    algo_name: "Disruption Risk Index",
    algo_formula: "Risk = Congestion × 0.4 + Rate_Shock × 0.3 + Supplier_Stress × 0.3",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_wire_names() {
        for v in VerticalId::ALL {
            assert_eq!(v.as_str().parse::<VerticalId>().unwrap(), v);
        }
        assert_eq!(" esg ".parse::<VerticalId>().unwrap(), VerticalId::Esg);
    }

    #[test]
    fn rejects_unknown() {
        let err = "crypto".parse::<VerticalId>().unwrap_err();
        assert_eq!(err.to_string(), "unknown vertical: crypto");
        let as_error: &dyn std::error::Error = &err;
        assert!(as_error.source().is_none());
    }

    #[test]
    fn serde_uses_snake_case() {
        let s = serde_json::to_string(&VerticalId::SupplyChain).unwrap();
        assert_eq!(s, "\"supply_chain\"");
    }

    #[test]
    fn every_vertical_has_distinct_profile() {
        let mut titles: Vec<_> = VerticalId::ALL.iter().map(|v| v.profile().title).collect();
        titles.sort();
        titles.dedup();
        assert_eq!(titles.len(), 5);
    }
}
