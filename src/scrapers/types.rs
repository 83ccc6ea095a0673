use serde::{Deserialize, Serialize};

/// What an index entry looks like from its marker phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// "Entered 2 hours ago"
    NewListing,
    /// "3 days on market"
    OnMarket,
    /// "Price changed"
    Updated,
}

/// A phrase that marks an on-page element as a listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMarker {
    pub phrase: String,
    pub kind: EntryKind,
}

/// Which rendering of a listing a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UrlKind {
    Printable,
    Pretty,
}

/// A substring that identifies the kind of a listing URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlShape {
    pub pattern: String,
    pub kind: UrlKind,
}

/// Matching tables for the portal's markup. The portal rewords things
/// regularly, so all of it is configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteRules {
    pub entry_markers: Vec<EntryMarker>,
    /// Checked in order; first match wins
    pub url_shapes: Vec<UrlShape>,
    pub next_page_label: String,
    pub print_class: String,
    pub title_suffixes: Vec<String>,
    pub placeholder_title: String,
    pub min_title_chars: usize,
    pub description_selector: String,
    pub row_selector: String,
}

impl Default for SiteRules {
    fn default() -> Self {
        let marker = |phrase: &str, kind| EntryMarker {
            phrase: phrase.to_string(),
            kind,
        };
        let shape = |pattern: &str, kind| UrlShape {
            pattern: pattern.to_string(),
            kind,
        };

        Self {
            entry_markers: vec![
                marker("Entered", EntryKind::NewListing),
                marker("day on market", EntryKind::OnMarket),
                marker("days on market", EntryKind::OnMarket),
                marker("Price changed", EntryKind::Updated),
            ],
            url_shapes: vec![
                shape("/cutsheet/print", UrlKind::Printable),
                shape("print=1", UrlKind::Printable),
                shape("/property/", UrlKind::Pretty),
                shape("#!/listing/", UrlKind::Pretty),
            ],
            next_page_label: "NEXT »".to_string(),
            print_class: "cutsheet-print".to_string(),
            title_suffixes: vec![
                " | ViewPoint.ca".to_string(),
                " - ViewPoint.ca".to_string(),
                " - ViewPoint".to_string(),
            ],
            placeholder_title: "about:blank".to_string(),
            min_title_chars: 10,
            description_selector: "div.description".to_string(),
            row_selector: "li.row".to_string(),
        }
    }
}

impl SiteRules {
    pub fn marker_phrases(&self) -> Vec<String> {
        self.entry_markers.iter().map(|m| m.phrase.clone()).collect()
    }

    /// Kind of the first marker whose phrase occurs in `text`
    pub fn classify_entry(&self, text: &str) -> Option<EntryKind> {
        self.entry_markers
            .iter()
            .find(|m| text.contains(&m.phrase))
            .map(|m| m.kind)
    }

    pub fn classify_url(&self, url: &str) -> Option<UrlKind> {
        self.url_shapes
            .iter()
            .find(|s| url.contains(&s.pattern))
            .map(|s| s.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_entries_by_marker_phrase() {
        let rules = SiteRules::default();
        assert_eq!(rules.classify_entry("Entered 3 hours ago"), Some(EntryKind::NewListing));
        assert_eq!(rules.classify_entry("1 day on market"), Some(EntryKind::OnMarket));
        assert_eq!(rules.classify_entry("12 days on market"), Some(EntryKind::OnMarket));
        assert_eq!(rules.classify_entry("Contact agent"), None);
    }

    #[test]
    fn printable_shape_wins_over_pretty() {
        let rules = SiteRules::default();
        assert_eq!(
            rules.classify_url("https://www.viewpoint.ca/property/123/cutsheet/print"),
            Some(UrlKind::Printable)
        );
        assert_eq!(
            rules.classify_url("https://www.viewpoint.ca/property/123"),
            Some(UrlKind::Pretty)
        );
        assert_eq!(rules.classify_url("https://www.viewpoint.ca/dashboard"), None);
    }

    #[test]
    fn tables_deserialize_from_toml() {
        let rules: SiteRules = toml::from_str(
            r#"
            next_page_label = "Next"

            [[entry_markers]]
            phrase = "Listed"
            kind = "new-listing"

            [[url_shapes]]
            pattern = "/print/"
            kind = "printable"
            "#,
        )
        .unwrap();

        assert_eq!(rules.marker_phrases(), vec!["Listed".to_string()]);
        assert_eq!(rules.classify_url("https://x/print/1"), Some(UrlKind::Printable));
        assert_eq!(rules.next_page_label, "Next");
        assert_eq!(rules.print_class, "cutsheet-print");
    }
}
