/// One raw usage measurement, as appended to the current hour's file.
///
/// Line form: `MM,total,used,avail,pct,mount` — comma-separated, no header,
/// sizes as unit-suffixed strings ("12.30G") and the percentage with a `%`.
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub minute:   String,  // "MM", zero-padded minute of hour
    pub total:    String,
    pub used:     String,
    pub avail:    String,
    pub used_pct: String,
    pub mount:    String,
}

impl SampleRow {
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.minute, self.total, self.used, self.avail, self.used_pct, self.mount
        )
    }
}

/// One averaged row in a summary file at any level.
///
/// `key` is the sub-period identifier (hour within a day file, day within a
/// month file, month within a year file); `columns` holds the four averaged
/// values (total, used, avail, pct) in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub key:     String,
    pub columns: Vec<String>,
    pub mount:   String,
}

impl SummaryRow {
    /// The value fields as persisted after the key: averages then mount.
    pub fn fields(&self) -> Vec<String> {
        let mut f = self.columns.clone();
        f.push(self.mount.clone());
        f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_row_line_form() {
        let row = SampleRow {
            minute:   "05".into(),
            total:    "100.00G".into(),
            used:     "40.00G".into(),
            avail:    "60.00G".into(),
            used_pct: "40.00%".into(),
            mount:    "/srv/ftp".into(),
        };
        assert_eq!(row.to_line(), "05,100.00G,40.00G,60.00G,40.00%,/srv/ftp");
    }

    #[test]
    fn summary_fields_append_mount_last() {
        let row = SummaryRow {
            key:     "03".into(),
            columns: vec!["1.00G".into(), "2.00G".into(), "3.00G".into(), "50.00%".into()],
            mount:   "/srv/ftp".into(),
        };
        assert_eq!(
            row.fields(),
            vec!["1.00G", "2.00G", "3.00G", "50.00%", "/srv/ftp"]
        );
    }
}
