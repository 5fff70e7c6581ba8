use crate::config::Config;

/// Presentation inputs derived from one configuration snapshot.
///
/// The presentation layer re-derives this on every reconfiguration signal;
/// nothing here is stateful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub theme: String,
    pub background_url: Option<String>,
    pub font_family: String,
    pub font_size_px: u32,
}

impl Presentation {
    pub fn from_config(config: &Config) -> Self {
        Self {
            theme: config.theme_name().to_string(),
            background_url: config.background_image().map(asset_url),
            font_family: config.font_family().to_string(),
            font_size_px: config.font_size_px(),
        }
    }

    /// Stylesheet link for the theme. `cache_buster` forces the browser to
    /// refetch a sheet that was edited in place.
    pub fn stylesheet_href(&self, cache_buster: u64) -> String {
        format!("/themes/{}.css?t={}", self.theme, cache_buster)
    }

    pub fn root_style(&self) -> String {
        format!(
            ":root {{ font-family: {}; font-size: {}px; }}",
            self.font_family, self.font_size_px
        )
    }
}

fn asset_url(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Human label for a theme identifier: `"dark-blue"` becomes `"Dark Blue"`.
pub fn display_name(theme: &str) -> String {
    theme
        .trim_end_matches(".css")
        .split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
