use plantae_transport::{InterruptData, VariationOptions, VariationSelection};
use snafu::{OptionExt, Snafu, ensure};

use crate::chat::message::EntryId;

pub type SelectionResult<T> = Result<T, SelectionError>;

/// Reasons a variation form submission is refused.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SelectionError {
    #[snafu(display("[{stage}] no option selected for '{category}'"))]
    MissingSelection {
        stage: &'static str,
        category: String,
    },

    #[snafu(display("[{stage}] '{value}' is not an option for '{category}'"))]
    UnknownOption {
        stage: &'static str,
        category: String,
        value: String,
    },
}

/// A pending human-in-the-loop request for product variations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptRequest {
    pub product_name: String,
    pub variation_options: VariationOptions,
    pub prompt_message: String,
}

impl InterruptRequest {
    pub fn new(
        product_name: impl Into<String>,
        variation_options: VariationOptions,
        prompt_message: impl Into<String>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            variation_options,
            prompt_message: prompt_message.into(),
        }
    }

    /// Checks that every category has exactly one offered value.
    ///
    /// The returned selection follows the category order of the form, not the
    /// order in which the host reported the choices.
    pub fn validate(&self, selection: &VariationSelection) -> SelectionResult<VariationSelection> {
        let mut ordered = Vec::with_capacity(self.variation_options.len());

        for (category, options) in self.variation_options.iter() {
            let value = selection
                .get(category)
                .filter(|value| !value.trim().is_empty())
                .context(MissingSelectionSnafu {
                    stage: "validate-selection",
                    category: category.to_string(),
                })?;
            ensure!(
                options.iter().any(|option| option == value),
                UnknownOptionSnafu {
                    stage: "validate-selection",
                    category: category.to_string(),
                    value: value.to_string(),
                }
            );
            ordered.push((category.to_string(), value.to_string()));
        }

        Ok(VariationSelection::new(ordered))
    }

    /// Markdown confirmation shown in place of the form once the user has chosen.
    pub fn confirmation_text(&self, selection: &VariationSelection) -> String {
        let choices = selection
            .iter()
            .map(|(category, value)| format!("{}: **{value}**", capitalize(category)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Chosen variation for **{}**: {choices}",
            self.product_name
        )
    }

    /// Inline form markup: one `<select>` per category plus submit and cancel controls.
    ///
    /// Server-provided text is escaped here; this markup never passes through
    /// the markdown sanitizer.
    pub fn render_form(&self, entry_id: EntryId) -> String {
        let mut html = String::new();
        html.push_str(&format!(
            "<div class=\"card shadow-sm border-0 mb-2 variation-selection\" data-interrupt-id=\"{}\">",
            entry_id.0
        ));
        html.push_str("<div class=\"card-body p-3\">");
        html.push_str(&format!(
            "<h6 class=\"fw-bold mb-3\">{}</h6>",
            ammonia::clean_text(&self.prompt_message)
        ));
        html.push_str(&format!(
            "<form class=\"row g-2 align-items-center\" data-interrupt-form=\"{}\">",
            entry_id.0
        ));

        for (category, options) in self.variation_options.iter() {
            let name = ammonia::clean_text(category);
            html.push_str("<div class=\"col-12 col-md-6 mb-2\">");
            html.push_str(&format!(
                "<label class=\"form-label fw-semibold me-2\" for=\"variation-select-{name}\">{}:</label>",
                ammonia::clean_text(&capitalize(category))
            ));
            html.push_str(&format!(
                "<select id=\"variation-select-{name}\" name=\"{name}\" class=\"form-select form-select-sm d-inline-block w-auto ms-2\">"
            ));
            for option in options {
                let option = ammonia::clean_text(option);
                html.push_str(&format!("<option value=\"{option}\">{option}</option>"));
            }
            html.push_str("</select></div>");
        }

        html.push_str("<div class=\"col-12 mt-2\">");
        html.push_str(
            "<button type=\"submit\" class=\"btn btn-success btn-sm px-4\" data-action=\"submit-variation\">Submit</button>",
        );
        html.push_str(
            "<button type=\"button\" class=\"btn btn-outline-secondary btn-sm ms-2\" data-action=\"cancel-variation\">Cancel</button>",
        );
        html.push_str("</div></form></div></div>");
        html
    }
}

impl From<InterruptData> for InterruptRequest {
    fn from(data: InterruptData) -> Self {
        Self::new(data.product_name, data.variation_dict, data.message)
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request() -> InterruptRequest {
        InterruptRequest::new(
            "Snake Plant",
            VariationOptions::new(vec![
                (
                    "color".to_string(),
                    vec!["Red".to_string(), "Blue".to_string()],
                ),
                ("size".to_string(), vec!["S".to_string(), "M".to_string()]),
            ]),
            "Please choose a variation",
        )
    }

    #[test]
    fn form_has_one_select_per_category() {
        let html = request().render_form(EntryId::new(4));

        let per_select: Vec<usize> = html
            .split("<select")
            .skip(1)
            .map(|select| {
                select
                    .split("</select>")
                    .next()
                    .unwrap_or_default()
                    .matches("<option")
                    .count()
            })
            .collect();
        assert_eq!(per_select, vec![2, 2]);
        assert!(html.contains("name=\"color\""));
        assert!(html.contains("data-action=\"cancel-variation\""));
    }

    #[test]
    fn server_text_in_form_is_escaped() {
        let mut request = request();
        request.prompt_message = "<img src=x onerror=alert(1)>".to_string();

        let html = request.render_form(EntryId::new(1));

        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img"));
    }

    #[test]
    fn validation_reorders_to_form_order() {
        let selection = VariationSelection::new(vec![
            ("size".to_string(), "S".to_string()),
            ("color".to_string(), "Red".to_string()),
        ]);

        let validated = request().validate(&selection).expect("valid selection");

        assert_eq!(
            validated,
            VariationSelection::new(vec![
                ("color".to_string(), "Red".to_string()),
                ("size".to_string(), "S".to_string()),
            ])
        );
    }

    #[test]
    fn missing_category_is_rejected() {
        let selection = VariationSelection::new(vec![("color".to_string(), "Red".to_string())]);

        let error = request().validate(&selection).expect_err("missing size");

        assert!(matches!(
            error,
            SelectionError::MissingSelection { ref category, .. } if category == "size"
        ));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let selection = VariationSelection::new(vec![
            ("color".to_string(), "Green".to_string()),
            ("size".to_string(), "S".to_string()),
        ]);

        assert!(matches!(
            request().validate(&selection),
            Err(SelectionError::UnknownOption { .. })
        ));
    }

    #[test]
    fn confirmation_lists_choices_in_order() {
        let selection = VariationSelection::new(vec![
            ("color".to_string(), "Red".to_string()),
            ("size".to_string(), "S".to_string()),
        ]);

        assert_eq!(
            request().confirmation_text(&selection),
            "Chosen variation for **Snake Plant**: Color: **Red**, Size: **S**"
        );
    }
}
