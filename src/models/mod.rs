use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

mod session;

pub use session::Session;

/// Field separator of the output sink
pub const FIELD_DELIMITER: &str = "\t";

/// One listing as read from its printable view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub captured_at: DateTime<Local>,
    /// Address line, with the site name removed
    pub title: String,
    pub url: String,
    pub description: String,
    /// Labeled detail rows in page order
    pub rows: Vec<String>,
}

impl ListingRecord {
    /// Positional fields, ending with an empty field so the written line
    /// carries a trailing separator
    pub fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(self.rows.len() + 5);
        fields.push(self.captured_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string());
        fields.push(self.title.clone());
        fields.push(self.url.clone());
        fields.push(self.description.clone());
        fields.extend(self.rows.iter().cloned());
        fields.push(String::new());
        fields
    }

    pub fn to_line(&self) -> String {
        self.fields().join(FIELD_DELIMITER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_keeps_row_order_and_trailing_separator() {
        let record = ListingRecord {
            captured_at: Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            title: "123 Main St".to_string(),
            url: "https://example.test/print".to_string(),
            description: "3 bed 2 bath".to_string(),
            rows: vec!["Taxes $4000".to_string(), "Lot size 50x100".to_string()],
        };

        assert_eq!(
            record.to_line(),
            "2024-05-01 09:30:00.000000\t123 Main St\thttps://example.test/print\t3 bed 2 bath\tTaxes $4000\tLot size 50x100\t"
        );
    }
}
