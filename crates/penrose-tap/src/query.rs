//! ADQL query construction.

use crate::error::{TapError, TapResult};

/// Placeholder substituted with the target source identifier.
pub const SOURCE_ID_PLACEHOLDER: &str = "{source_id}";

/// Default neighbourhood query against Gaia DR3.
///
/// Selects the 15000 brightest stars as they would appear from the target
/// source, ranked by apparent magnitude adjusted for the change of viewpoint.
pub const DEFAULT_TEMPLATE: &str = "WITH target AS (\
SELECT source_id, ra, dec, parallax, phot_g_mean_mag \
FROM gaiadr3.gaia_source WHERE source_id = {source_id}) \
SELECT TOP 15000 s.source_id, s.ra, s.dec, s.parallax, s.phot_g_mean_mag, \
p.parallax AS target_parallax, \
ABS(1/s.parallax - 1/p.parallax) AS dist_from_target_pc, \
s.phot_g_mean_mag + 5 * LOG10(ABS(1/s.parallax) / ABS(1/s.parallax - 1/p.parallax)) AS adjusted_mag \
FROM gaiadr3.gaia_source s, target p \
WHERE s.parallax > 0 \
AND s.phot_g_mean_mag IS NOT NULL \
AND s.source_id != p.source_id \
AND s.phot_g_mean_mag + 5 * LOG10(ABS(1/s.parallax) / ABS(1/s.parallax - 1/p.parallax)) < 6.5 \
ORDER BY adjusted_mag ASC";

/// Check that a source identifier is a non-empty run of ASCII digits.
///
/// Gaia source identifiers are 64-bit integers; anything else would be
/// spliced verbatim into ADQL text.
pub fn validate_source_id(source_id: &str) -> TapResult<()> {
    if !source_id.is_empty() && source_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(TapError::InvalidSourceId(source_id.to_string()))
    }
}

/// An ADQL query with a single `{source_id}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdqlTemplate {
    text: String,
}

impl AdqlTemplate {
    /// Build a template, rejecting text without exactly one placeholder.
    pub fn new(text: impl Into<String>) -> TapResult<Self> {
        let text = text.into();
        match text.matches(SOURCE_ID_PLACEHOLDER).count() {
            1 => Ok(Self { text }),
            n => Err(TapError::Configuration(format!(
                "query template must contain exactly one {SOURCE_ID_PLACEHOLDER} placeholder, found {n}"
            ))),
        }
    }

    /// Render the query for `source_id`.
    pub fn render(&self, source_id: &str) -> TapResult<String> {
        validate_source_id(source_id)?;
        Ok(self.text.replace(SOURCE_ID_PLACEHOLDER, source_id))
    }

    /// Raw template text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for AdqlTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_has_one_placeholder() {
        assert!(AdqlTemplate::new(DEFAULT_TEMPLATE).is_ok());
    }

    #[test]
    fn test_render_substitutes_source_id() {
        let query = AdqlTemplate::default().render("5853498713190525696").unwrap();
        assert!(query.contains("WHERE source_id = 5853498713190525696)"));
        assert!(!query.contains(SOURCE_ID_PLACEHOLDER));
        assert!(query.starts_with("WITH target AS"));
    }

    #[test]
    fn test_render_rejects_non_numeric() {
        let template = AdqlTemplate::default();
        assert!(matches!(
            template.render("1 OR 1=1"),
            Err(TapError::InvalidSourceId(_))
        ));
        assert!(template.render("").is_err());
        assert!(template.render("-42").is_err());
    }

    #[test]
    fn test_template_placeholder_count() {
        assert!(AdqlTemplate::new("SELECT 1").is_err());
        assert!(AdqlTemplate::new("{source_id} {source_id}").is_err());
        let t = AdqlTemplate::new("SELECT * FROM t WHERE id = {source_id}").unwrap();
        assert_eq!(t.render("7").unwrap(), "SELECT * FROM t WHERE id = 7");
    }
}
