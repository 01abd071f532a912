use cms_types::UriScheme;

/// Maps plugin URIs to bundle base URLs under `plugins_base_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginUrlBuilder {
    plugins_base_url: String,
}

impl PluginUrlBuilder {
    pub fn new(plugins_base_url: impl Into<String>) -> Self {
        Self {
            plugins_base_url: plugins_base_url.into(),
        }
    }

    /// `plugin://acme/blog` + `1.0.0` → `{base}/acme/blog/1.0.0`.
    pub fn build(&self, plugin_uri: &str, version: Option<&str>) -> String {
        let path = UriScheme::Plugin.strip(plugin_uri).unwrap_or(plugin_uri);
        match version {
            Some(version) if !version.is_empty() => {
                format!("{}/{path}/{version}", self.plugins_base_url)
            }
            _ => format!("{}/{path}", self.plugins_base_url),
        }
    }

    pub fn bundle_url(&self, plugin_uri: &str, version: Option<&str>) -> String {
        format!("{}/index.js", self.build(plugin_uri, version))
    }

    /// Base URL of the plugin's own assets, with a trailing slash.
    pub fn public_path(&self, plugin_uri: &str, version: Option<&str>) -> String {
        format!("{}/", self.build(plugin_uri, version))
    }
}

/// Name of the one-shot callback a bundle invokes with its exports.
///
/// `plugin://acme/my-blog.v2` → `__acme__myBlog_v2`.
pub fn callback_id(plugin_uri: &str) -> String {
    let path = UriScheme::Plugin
        .strip(plugin_uri)
        .unwrap_or(plugin_uri)
        .replace('.', "_")
        .replace('/', "__");

    let mut id = String::with_capacity(path.len() + 2);
    id.push_str("__");
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(next) if c == '-' && next.is_ascii_alphabetic() => {
                id.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => id.push(c),
        }
    }
    id
}
