//! Query families bound to a container.
//!
//! [`within`] binds every family to one node; [`screen`] binds them to the
//! body of the default document registered with [`set_default_document`].
//!
//! ```
//! use probar_dom::{within, Document, RoleQuery};
//!
//! let doc = Document::parse("<form><button>Save</button></form>");
//! let form = within(&doc.body());
//! let button = form.get_by_role(RoleQuery::new("button").name("Save")).unwrap();
//! assert_eq!(form.get_by_text("Save").unwrap(), button);
//! ```

use std::sync::{PoisonError, RwLock};

use crate::config::{get_config, Config};
use crate::dom::{Document, Node};
use crate::pretty::{log_dom, pretty_dom, PrettyDomOptions};
use crate::queries::{
    self, AltTextQuery, DisplayValueQuery, LabelTextQuery, PlaceholderQuery, RoleQuery,
    TestIdQuery, TextQuery, TitleQuery,
};
use crate::result::{QueryError, QueryResult};
use crate::wait::{wait_for, wait_for_element_to_be_removed, WaitOptions};

static DEFAULT_DOCUMENT: RwLock<Option<Document>> = RwLock::new(None);

/// Register the document used by [`screen`]
pub fn set_default_document(document: &Document) {
    let mut slot = DEFAULT_DOCUMENT
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = Some(document.clone());
    tracing::debug!("default document set");
}

/// Forget the default document
pub fn clear_default_document() {
    let mut slot = DEFAULT_DOCUMENT
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = None;
}

/// The document registered with [`set_default_document`]
pub fn default_document() -> QueryResult<Document> {
    DEFAULT_DOCUMENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or_else(|| {
            QueryError::configuration(
                "For queries bound to the default document a global document has to be \
                 available. Call set_default_document first, or bind the queries to a \
                 container with within().",
            )
        })
}

/// Queries bound to the body of the default document
pub fn screen() -> QueryResult<Queries> {
    Ok(within(&default_document()?.body()))
}

/// Queries bound to `container`, reading the process-wide config on each call
#[must_use]
pub fn within(container: &Node) -> Queries {
    Queries {
        container: container.clone(),
        config: None,
        wait: None,
    }
}

/// Queries bound to `container` with a fixed config
#[must_use]
pub fn within_with_config(container: &Node, config: Config) -> Queries {
    Queries {
        container: container.clone(),
        config: Some(config),
        wait: None,
    }
}

/// Every query family, bound to one container
#[derive(Debug, Clone)]
pub struct Queries {
    container: Node,
    config: Option<Config>,
    wait: Option<WaitOptions>,
}

macro_rules! family_methods {
    (
        $family:ident, $args:ty,
        $query_all:ident, $query:ident,
        $get_all:ident, $get:ident,
        $find_all:ident, $find:ident
    ) => {
        #[doc = concat!("All matches (`", stringify!($family), "`)")]
        pub fn $query_all(&self, args: impl Into<$args>) -> QueryResult<Vec<Node>> {
            queries::$family::family(&self.config()).query_all_by(&self.container, &args.into())
        }

        #[doc = concat!("The single match or `None` (`", stringify!($family), "`)")]
        pub fn $query(&self, args: impl Into<$args>) -> QueryResult<Option<Node>> {
            queries::$family::family(&self.config()).query_by(&self.container, &args.into())
        }

        #[doc = concat!("All matches, at least one (`", stringify!($family), "`)")]
        pub fn $get_all(&self, args: impl Into<$args>) -> QueryResult<Vec<Node>> {
            queries::$family::family(&self.config()).get_all_by(&self.container, &args.into())
        }

        #[doc = concat!("Exactly one match (`", stringify!($family), "`)")]
        pub fn $get(&self, args: impl Into<$args>) -> QueryResult<Node> {
            queries::$family::family(&self.config()).get_by(&self.container, &args.into())
        }

        #[doc = concat!("Wait for at least one match (`", stringify!($family), "`)")]
        pub async fn $find_all(&self, args: impl Into<$args>) -> QueryResult<Vec<Node>> {
            let config = self.config();
            let options = self.wait_options(&config);
            let args = args.into();
            queries::$family::family(&config)
                .find_all_by_with_options(&self.container, &args, &options)
                .await
        }

        #[doc = concat!("Wait for exactly one match (`", stringify!($family), "`)")]
        pub async fn $find(&self, args: impl Into<$args>) -> QueryResult<Node> {
            let config = self.config();
            let options = self.wait_options(&config);
            let args = args.into();
            queries::$family::family(&config)
                .find_by_with_options(&self.container, &args, &options)
                .await
        }
    };
}

impl Queries {
    /// The bound container
    #[must_use]
    pub const fn container(&self) -> &Node {
        &self.container
    }

    /// Config in effect: the fixed one, or a snapshot of the process-wide one
    #[must_use]
    pub fn config(&self) -> Config {
        self.config.clone().unwrap_or_else(get_config)
    }

    /// Use `options` for every `find_*` call instead of the config defaults
    #[must_use]
    pub fn with_wait_options(mut self, options: WaitOptions) -> Self {
        self.wait = Some(options);
        self
    }

    fn wait_options(&self, config: &Config) -> WaitOptions {
        self.wait
            .clone()
            .unwrap_or_else(|| WaitOptions::from_config(config))
    }

    /// Pretty-printed container
    #[must_use]
    pub fn pretty(&self) -> String {
        pretty_dom(&self.container, &PrettyDomOptions::from_config(&self.config()))
    }

    /// Log the pretty-printed container
    pub fn debug(&self) {
        log_dom(&self.container, &PrettyDomOptions::from_config(&self.config()));
    }

    /// [`wait_for`] with this container and the bound wait options
    pub async fn wait_for<T, F>(&self, callback: F) -> QueryResult<T>
    where
        F: FnMut() -> QueryResult<T>,
    {
        let options = self.wait_options(&self.config());
        wait_for(&self.container, callback, &options).await
    }

    /// [`wait_for_element_to_be_removed`] with this container
    pub async fn wait_for_element_to_be_removed<F>(&self, callback: F) -> QueryResult<()>
    where
        F: FnMut() -> QueryResult<Vec<Node>>,
    {
        let options = self.wait_options(&self.config());
        wait_for_element_to_be_removed(&self.container, callback, &options).await
    }

    family_methods!(
        test_id, TestIdQuery,
        query_all_by_test_id, query_by_test_id,
        get_all_by_test_id, get_by_test_id,
        find_all_by_test_id, find_by_test_id
    );

    family_methods!(
        text, TextQuery,
        query_all_by_text, query_by_text,
        get_all_by_text, get_by_text,
        find_all_by_text, find_by_text
    );

    family_methods!(
        placeholder, PlaceholderQuery,
        query_all_by_placeholder_text, query_by_placeholder_text,
        get_all_by_placeholder_text, get_by_placeholder_text,
        find_all_by_placeholder_text, find_by_placeholder_text
    );

    family_methods!(
        alt_text, AltTextQuery,
        query_all_by_alt_text, query_by_alt_text,
        get_all_by_alt_text, get_by_alt_text,
        find_all_by_alt_text, find_by_alt_text
    );

    family_methods!(
        title, TitleQuery,
        query_all_by_title, query_by_title,
        get_all_by_title, get_by_title,
        find_all_by_title, find_by_title
    );

    family_methods!(
        display_value, DisplayValueQuery,
        query_all_by_display_value, query_by_display_value,
        get_all_by_display_value, get_by_display_value,
        find_all_by_display_value, find_by_display_value
    );

    family_methods!(
        label_text, LabelTextQuery,
        query_all_by_label_text, query_by_label_text,
        get_all_by_label_text, get_by_label_text,
        find_all_by_label_text, find_by_label_text
    );

    family_methods!(
        role, RoleQuery,
        query_all_by_role, query_by_role,
        get_all_by_role, get_by_role,
        find_all_by_role, find_by_role
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn page() -> Document {
        Document::parse(
            "<header><h1>Shop</h1></header>\
             <form>\
               <label for=\"q\">Search</label>\
               <input id=\"q\" placeholder=\"Find products\" value=\"shoes\">\
               <button data-testid=\"go\" title=\"Run search\">Go</button>\
             </form>\
             <img alt=\"Logo\">",
        )
    }

    #[test]
    fn test_every_family_is_reachable() {
        let doc = page();
        let q = within_with_config(&doc.body(), Config::default());
        let input = q.get_by_label_text("Search").unwrap();
        assert_eq!(q.get_by_placeholder_text("Find products").unwrap(), input);
        assert_eq!(q.get_by_display_value("shoes").unwrap(), input);
        assert_eq!(q.get_by_role("textbox").unwrap(), input);

        let button = q.get_by_test_id("go").unwrap();
        assert_eq!(q.get_by_text("Go").unwrap(), button);
        assert_eq!(q.get_by_title("Run search").unwrap(), button);
        assert_eq!(q.get_by_role(RoleQuery::new("button").name("Go")).unwrap(), button);

        assert!(q.query_by_alt_text("Logo").unwrap().is_some());
        assert_eq!(q.get_all_by_role("heading").unwrap().len(), 1);
        assert!(q.query_all_by_text("Nothing").unwrap().is_empty());
    }

    #[test]
    fn test_within_narrows_container() {
        let doc = page();
        let form = doc.body().query_selector("form").unwrap().unwrap();
        let q = within_with_config(&form, Config::default());
        assert!(q.query_by_role("heading").unwrap().is_none());
        assert_eq!(q.container(), &form);
    }

    #[test]
    fn test_fixed_config_is_used() {
        let doc = Document::parse("<p qa=\"x\"></p>");
        let q = within_with_config(&doc.body(), Config::default().with_test_id_attribute("qa"));
        assert!(q.get_by_test_id("x").is_ok());
        assert_eq!(q.config().test_id_attribute, "qa");
    }

    #[test]
    fn test_pretty_uses_container() {
        let doc = page();
        let form = doc.body().query_selector("form").unwrap().unwrap();
        let q = within_with_config(&form, Config::default());
        assert!(q.pretty().starts_with("<form>"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_by_text_with_wait_options() {
        let doc = Document::new();
        let q = within_with_config(&doc.body(), Config::default())
            .with_wait_options(WaitOptions::default().with_timeout(5_000));
        let writer = doc.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_000)).await;
            writer.body().set_inner_html("<p>Loaded</p>").unwrap();
        });
        let p = q.find_by_text("Loaded").await.unwrap();
        assert_eq!(p.tag_name().unwrap(), "p");
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_all_by_role_times_out() {
        let doc = Document::new();
        let q = within_with_config(&doc.body(), Config::default().with_async_util_timeout(100));
        let err = q.find_all_by_role("alert").await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err
            .to_string()
            .starts_with("Unable to find an accessible element with the role \"alert\""));
    }
}
