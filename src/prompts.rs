//! Query text sent to the assistant for each lookup kind.

use crate::models::LookupKind;

/// How much instruction the backend needs alongside the coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// The remote assistant already carries PSAP instructions; primary
    /// lookups send the bare coordinate text.
    Instructed,
    /// Plain completion endpoint; every query spells out the task and format.
    SelfContained,
}

const FORMAT_SINGLE: &str = "Format the answer exactly as:\n\
PSAP: [Name]\n\
PSAP Website: [URL, omit the line if unknown]\n\
Phone: [Comma-separated phone numbers]\n\
Jurisdiction: [Coverage Area]";

const FORMAT_MULTIPLE: &str = "Format each PSAP as:\n\
PSAP: [Name]\n\
PSAP Website: [URL, omit the line if unknown]\n\
Phone: [Comma-separated phone numbers]\n\
Jurisdiction: [Coverage Area]\n\
\n\
Separate each PSAP with a blank line.";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    radius_miles: u32,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self { radius_miles: 50 }
    }
}

impl PromptBuilder {
    pub fn new(radius_miles: u32) -> Self {
        Self { radius_miles }
    }

    pub fn build(&self, kind: LookupKind, coordinates: &str, style: PromptStyle) -> String {
        match (kind, style) {
            (LookupKind::Primary, PromptStyle::Instructed) => coordinates.to_string(),
            (LookupKind::Primary, PromptStyle::SelfContained) => self.primary(coordinates),
            (LookupKind::Nearby, _) => self.nearby(coordinates),
        }
    }

    fn primary(&self, coordinates: &str) -> String {
        format!(
            "Identify the Public Safety Answering Point (PSAP) responsible for 911 calls \
             originating at these GPS coordinates: {coordinates}.\n\
             \n\
             Give the primary emergency dispatch center for the exact location, its \
             published emergency and non-emergency phone numbers, and the area it covers.\n\
             \n\
             {FORMAT_SINGLE}"
        )
    }

    fn nearby(&self, coordinates: &str) -> String {
        format!(
            "Find all nearby PSAPs and emergency dispatch centers within a {radius}-mile \
             radius of these coordinates: {coordinates}.\n\
             \n\
             Please provide 3 to 5 options in case the primary PSAP is unavailable. Include:\n\
             - Primary PSAP for this exact location\n\
             - 2-3 nearby backup PSAPs that could handle emergencies in this area\n\
             - Regional dispatch centers that cover this area\n\
             \n\
             {FORMAT_MULTIPLE}",
            radius = self.radius_miles
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instructed_primary_is_raw_coordinates() {
        let prompts = PromptBuilder::default();
        assert_eq!(
            prompts.build(LookupKind::Primary, "40.7128, -74.0060", PromptStyle::Instructed),
            "40.7128, -74.0060"
        );
    }

    #[test]
    fn test_self_contained_primary_carries_format() {
        let prompt = PromptBuilder::default().build(
            LookupKind::Primary,
            "40.7128, -74.0060",
            PromptStyle::SelfContained,
        );
        assert!(prompt.contains("40.7128, -74.0060"));
        assert!(prompt.contains("PSAP: [Name]"));
        assert!(prompt.contains("Jurisdiction: [Coverage Area]"));
    }

    #[test]
    fn test_nearby_prompt_radius_and_separator() {
        let prompts = PromptBuilder::new(25);
        for style in [PromptStyle::Instructed, PromptStyle::SelfContained] {
            let prompt = prompts.build(LookupKind::Nearby, "34.05 N, 118.24 W", style);
            assert!(prompt.contains("25-mile radius of these coordinates: 34.05 N, 118.24 W"));
            assert!(prompt.contains("Separate each PSAP with a blank line."));
            assert!(prompt.contains("3 to 5"));
        }
    }
}
