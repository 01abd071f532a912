use crate::error::PageStructureError;
use crate::tree::PageTree;
use cms_model::RouteParams;
use cms_types::UriScheme;
use url::Url;

/// Turns `page://` links into public URLs via the page's canonical-URL builder.
pub struct InternalUrlResolver<'a> {
    pages: &'a PageTree,
}

impl<'a> InternalUrlResolver<'a> {
    pub fn new(pages: &'a PageTree) -> Self {
        Self { pages }
    }

    /// `page://product?id=3#reviews` → the product page's canonical URL for
    /// `{id: "3"}` followed by `#reviews`. `Ok(None)` when the page isn't
    /// configured or has no canonical-URL builder.
    pub fn resolve(&self, uri: &str) -> Result<Option<String>, PageStructureError> {
        if !UriScheme::Page.matches(uri) {
            return Err(PageStructureError::NotAPageUri(uri.to_string()));
        }
        let parsed = Url::parse(uri).map_err(|source| PageStructureError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;
        let base = uri
            .split(['?', '#'])
            .next()
            .unwrap_or(uri);

        let Some(page) = self.pages.find_page(base) else {
            return Ok(None);
        };
        let Some(build) = page.def.build_canonical_url.as_ref() else {
            return Ok(None);
        };

        let params: RouteParams = parsed.query_pairs().into_owned().collect();
        let mut url = build(&params);
        if let Some(fragment) = parsed.fragment() {
            url.push('#');
            url.push_str(fragment);
        }
        Ok(Some(url))
    }
}
