//! Predefined batch templates.
//!
//! A template expands to a ready-made list of generation requests for a
//! common dashboard theme.

use serde::{Deserialize, Serialize};

use crate::batch::NewGenerationItem;
use crate::error::CoreError;

/// Named request bundles that can replace an explicit request list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchTemplate {
    Executive,
    Marketing,
    Operations,
}

/// All templates, in display order.
pub const ALL_TEMPLATES: &[BatchTemplate] = &[
    BatchTemplate::Executive,
    BatchTemplate::Marketing,
    BatchTemplate::Operations,
];

impl BatchTemplate {
    pub fn name(self) -> &'static str {
        match self {
            Self::Executive => "executive",
            Self::Marketing => "marketing",
            Self::Operations => "operations",
        }
    }

    /// Look up a template by its name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        ALL_TEMPLATES
            .iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| {
                let valid: Vec<&str> = ALL_TEMPLATES.iter().map(|t| t.name()).collect();
                CoreError::Validation(format!(
                    "Unknown batch template '{name}'. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }

    /// The requests this template expands to.
    pub fn requests(self) -> Vec<NewGenerationItem> {
        let specs: &[(&str, i32, &str)] = match self {
            Self::Executive => &[
                ("Show monthly revenue trends for the last 12 months", 5, "line"),
                ("Display top 10 products by sales volume", 4, "bar"),
                ("Show customer acquisition by channel", 3, "pie"),
                ("Display regional sales performance", 3, "bar"),
                ("Show profit margin trends over time", 2, "line"),
            ],
            Self::Marketing => &[
                ("Show website traffic by source for last 6 months", 5, "area"),
                ("Display conversion rates by campaign", 4, "bar"),
                ("Show email campaign performance metrics", 3, "line"),
                ("Display social media engagement trends", 3, "line"),
                ("Show lead generation by channel", 2, "pie"),
            ],
            Self::Operations => &[
                ("Show production efficiency trends", 5, "line"),
                ("Display inventory levels by category", 4, "bar"),
                ("Show quality metrics over time", 3, "line"),
                ("Display supplier performance ratings", 3, "heatmap"),
                ("Show cost breakdown by department", 2, "pie"),
            ],
        };

        specs
            .iter()
            .map(|(prompt, priority, hint)| {
                NewGenerationItem::new(*prompt)
                    .with_priority(*priority)
                    .with_hint(*hint)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::validate_items;

    #[test]
    fn every_template_produces_valid_requests() {
        for template in ALL_TEMPLATES {
            let requests = template.requests();
            assert_eq!(requests.len(), 5, "{}", template.name());
            assert!(validate_items(&requests).is_ok());
        }
    }

    #[test]
    fn from_name_round_trips() {
        for template in ALL_TEMPLATES {
            assert_eq!(BatchTemplate::from_name(template.name()).unwrap(), *template);
        }
    }

    #[test]
    fn unknown_template_rejected() {
        assert!(BatchTemplate::from_name("finance").is_err());
    }
}
