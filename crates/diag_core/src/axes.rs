//! Fixed axis catalogue.
//!
//! The seven thematic axes of the maturity diagnostic, each scored through
//! three blocks (positive findings, negative findings, proposed solution).
//! This set is configuration, not end-user definable.

/// One thematic axis with its suggested checklist entries per block.
///
/// Solution-block suggestions come from the external product catalogue and
/// are intentionally absent here.
#[derive(Debug, Clone, Copy)]
pub struct AxisDef {
    pub key: &'static str,
    pub title: &'static str,
    pub positive_checklist: &'static [&'static str],
    pub negative_checklist: &'static [&'static str],
}

pub const BLOCK_KEYS: [&str; 3] = ["positive", "negative", "solution"];

pub const AXES: [AxisDef; 7] = [
    AxisDef {
        key: "governance_planning",
        title: "Procurement governance and planning",
        positive_checklist: &[
            "Annual procurement plan drafted and published",
            "Consolidated yearly purchasing calendar",
            "Plan aligned with the multi-year budget framework",
            "Indicator-driven planning management",
            "Requesting units integrated into the process",
        ],
        negative_checklist: &[
            "Recurring emergency purchases",
            "Planning not published",
            "No alignment with technical departments",
            "No official schedule",
            "Risks not mapped during planning",
        ],
    },
    AxisDef {
        key: "people_capability",
        title: "Training and people management",
        positive_checklist: &[
            "Active annual training plan",
            "Team trained on the current procurement statute",
            "Internal knowledge-sharing routines",
            "Access to partner training programmes",
            "Competency records per role",
        ],
        negative_checklist: &[
            "High team turnover",
            "One-off training without continuity",
            "No learning tracks per profile",
            "Unfamiliarity with updated regulations",
            "Little dedicated staffing for the unit",
        ],
    },
    AxisDef {
        key: "risk_controls",
        title: "Risk management and internal controls",
        positive_checklist: &[
            "Risk matrix in use",
            "Internal controls defined",
            "Segregation of duties implemented",
            "Periodic internal audits",
            "Documented mitigation plan",
        ],
        negative_checklist: &[
            "Risks not formalized",
            "Controls missing or informal",
            "Recurring bidding failures",
            "No mitigation plan",
            "Weak integration with internal control",
        ],
    },
    AxisDef {
        key: "digitalization_systems",
        title: "Digitalization and systems",
        positive_checklist: &[
            "National procurement portal in use",
            "Electronic case processing in place",
            "Digital contract management",
            "Transparency portal kept current",
            "Institutional digital signature",
        ],
        negative_checklist: &[
            "Processes still paper-based",
            "Low system interoperability",
            "Scattered or incomplete data",
            "Team untrained on the systems",
            "Publications past their deadline",
        ],
    },
    AxisDef {
        key: "sustainability_inclusion",
        title: "Sustainability and economic inclusion",
        positive_checklist: &[
            "Sustainability criteria in purchases",
            "Purchasing focused on local impact",
            "Inclusion of vulnerable groups",
            "Dialogue with family farming",
            "Sustainability indicators tracked",
        ],
        negative_checklist: &[
            "No sustainability criteria",
            "Weak link to social policies",
            "Little outreach to local suppliers",
            "No socio-environmental indicators",
            "Little use of innovative purchasing",
        ],
    },
    AxisDef {
        key: "sme_integration",
        title: "Small-business integration and local development",
        positive_checklist: &[
            "Joint actions with the entrepreneur service desk",
            "Active publication of opportunities",
            "Training for local suppliers",
            "Local small businesses mapped",
            "Accreditation procedures in use",
        ],
        negative_checklist: &[
            "Low small-business participation",
            "Poor communication with local producers",
            "Unfamiliarity with the small-business statute",
            "Supplier registration hurdles",
            "Bid notices too complex for small firms",
        ],
    },
    AxisDef {
        key: "statutory_adherence",
        title: "Adherence to the procurement statute",
        positive_checklist: &[
            "Internal regulations updated to the statute",
            "Standard artefacts and templates adopted",
            "Contract governance roles designated",
            "Preliminary technical studies routine",
            "Sanctioning process structured",
        ],
        negative_checklist: &[
            "Internal rules still under the old statute",
            "No standardized artefacts",
            "Contract oversight roles unassigned",
            "Direct contracting poorly documented",
            "No structured sanctioning flow",
        ],
    },
];

/// Look up an axis definition by key.
pub fn axis(key: &str) -> Option<&'static AxisDef> {
    AXES.iter().find(|a| a.key == key)
}

/// Whether `key` names a configured axis.
pub fn is_known_axis(key: &str) -> bool {
    axis(key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_axes_with_unique_keys() {
        assert_eq!(AXES.len(), 7);
        let mut keys: Vec<_> = AXES.iter().map(|a| a.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 7);
    }

    #[test]
    fn lookup_by_key() {
        assert!(is_known_axis("governance_planning"));
        assert!(is_known_axis("statutory_adherence"));
        assert!(!is_known_axis("made_up_axis"));
        assert_eq!(
            axis("risk_controls").map(|a| a.title),
            Some("Risk management and internal controls")
        );
    }
}
