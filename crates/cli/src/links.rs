//! Hyperlinks for report cells: key URLs from a `{key}` template, and
//! address search URLs built from street/city/state/zip.

use regex::Regex;

use parcelrec_recon::config::ReportConfig;

pub struct LinkBuilder {
    key_template: Option<String>,
    address_base: String,
    unit_suffix: Regex,
    punctuation: Regex,
    whitespace: Regex,
}

impl LinkBuilder {
    pub fn new(report: &ReportConfig) -> Result<Self, String> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| format!("invalid link pattern {pattern:?}: {e}"))
        };
        Ok(Self {
            key_template: report.key_url.clone(),
            address_base: report.address_url_base.clone(),
            unit_suffix: compile(r"(?i)\s+(Apt|Unit|#|Suite)\s*[\w-]*$")?,
            punctuation: compile(r"[^\w\s-]")?,
            whitespace: compile(r"\s+")?,
        })
    }

    /// `None` when no `key_url` template is configured.
    pub fn key_url(&self, key: &str) -> Option<String> {
        self.key_template
            .as_ref()
            .map(|template| template.replace("{key}", key.trim()))
    }

    /// Search URL for an address, e.g.
    /// `https://www.zillow.com/homes/44-Elm-Ave-Kettering-OH-45429_rb/`.
    /// Unit designators are dropped and ZIP+4 is cut to five digits.
    /// `None` when street, city or zip is blank.
    pub fn address_url(
        &self,
        street: &str,
        city: &str,
        state: Option<&str>,
        zip: &str,
    ) -> Option<String> {
        let (street, city, zip) = (street.trim(), city.trim(), zip.trim());
        if street.is_empty() || city.is_empty() || zip.is_empty() {
            return None;
        }

        let street = self.unit_suffix.replace(street, "");
        let street = self.slug(&street);
        let city = self.slug(city);
        let zip = zip.split('-').next().unwrap_or(zip).trim();

        let mut parts = vec![street, city];
        if let Some(state) = state.map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(self.slug(state));
        }
        parts.push(zip.to_string());

        Some(format!("{}{}_rb/", self.address_base, parts.join("-")))
    }

    fn slug(&self, text: &str) -> String {
        let cleaned = self.punctuation.replace_all(text.trim(), "");
        self.whitespace.replace_all(cleaned.trim(), "-").into_owned()
    }
}
