//! Read-only access to the module catalog
//!
//! Resolution only ever reads ModuleTemplates and ModuleReleaseMetas. The
//! [`ModuleCatalog`] trait abstracts those reads so the engine can run
//! against the API server ([`KubeCatalog`]) or a fixed in-memory set
//! ([`CatalogSnapshot`]).

use async_trait::async_trait;
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::{ModuleReleaseMeta, ModuleTemplate};
use crate::Error;

/// Trait abstracting catalog reads
///
/// A missing object is `Ok(None)`, never an error. Transport failures are
/// returned unchanged.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// Get a ModuleTemplate by namespace and name
    async fn get_template(&self, namespace: &str, name: &str)
        -> Result<Option<ModuleTemplate>, Error>;

    /// List all ModuleTemplates in a namespace
    async fn list_templates(&self, namespace: &str) -> Result<Vec<ModuleTemplate>, Error>;

    /// Get the ModuleReleaseMeta of a module
    async fn get_release_meta(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ModuleReleaseMeta>, Error>;
}

/// Catalog backed by the Kubernetes API
pub struct KubeCatalog {
    client: Client,
}

impl KubeCatalog {
    /// Create a new KubeCatalog wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModuleCatalog for KubeCatalog {
    async fn get_template(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ModuleTemplate>, Error> {
        let api: Api<ModuleTemplate> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(template) => Ok(Some(template)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_templates(&self, namespace: &str) -> Result<Vec<ModuleTemplate>, Error> {
        let api: Api<ModuleTemplate> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        debug!(namespace = %namespace, count = list.items.len(), "listed module templates");
        Ok(list.items)
    }

    async fn get_release_meta(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ModuleReleaseMeta>, Error> {
        let api: Api<ModuleReleaseMeta> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(meta) => Ok(Some(meta)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fixed, in-memory catalog
///
/// Objects without a namespace are visible from every namespace.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    templates: Vec<ModuleTemplate>,
    release_metas: Vec<ModuleReleaseMeta>,
}

impl CatalogSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template
    pub fn with_template(mut self, template: ModuleTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Add release metadata
    pub fn with_release_meta(mut self, meta: ModuleReleaseMeta) -> Self {
        self.release_metas.push(meta);
        self
    }
}

fn visible_in<K: ResourceExt>(obj: &K, namespace: &str) -> bool {
    obj.namespace().map_or(true, |ns| ns == namespace)
}

#[async_trait]
impl ModuleCatalog for CatalogSnapshot {
    async fn get_template(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ModuleTemplate>, Error> {
        Ok(self
            .templates
            .iter()
            .find(|t| t.name_any() == name && visible_in(*t, namespace))
            .cloned())
    }

    async fn list_templates(&self, namespace: &str) -> Result<Vec<ModuleTemplate>, Error> {
        Ok(self
            .templates
            .iter()
            .filter(|t| visible_in(*t, namespace))
            .cloned()
            .collect())
    }

    async fn get_release_meta(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ModuleReleaseMeta>, Error> {
        Ok(self
            .release_metas
            .iter()
            .find(|m| m.name_any() == name && visible_in(*m, namespace))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ModuleReleaseMetaSpec, ModuleTemplateSpec};

    fn template(name: &str, namespace: Option<&str>) -> ModuleTemplate {
        let mut t = ModuleTemplate::new(name, ModuleTemplateSpec::default());
        t.metadata.namespace = namespace.map(str::to_string);
        t
    }

    #[tokio::test]
    async fn test_snapshot_scopes_by_namespace() {
        let catalog = CatalogSnapshot::new()
            .with_template(template("a-1.0.0", Some("kcp-system")))
            .with_template(template("b-1.0.0", Some("other")))
            .with_template(template("c-1.0.0", None));

        let names: Vec<String> = catalog
            .list_templates("kcp-system")
            .await
            .unwrap()
            .iter()
            .map(|t| t.name_any())
            .collect();
        assert_eq!(names, vec!["a-1.0.0", "c-1.0.0"]);

        assert!(catalog
            .get_template("kcp-system", "b-1.0.0")
            .await
            .unwrap()
            .is_none());
        assert!(catalog
            .get_template("kcp-system", "c-1.0.0")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_snapshot_missing_release_meta_is_none() {
        let catalog = CatalogSnapshot::new().with_release_meta(ModuleReleaseMeta::new(
            "serverless",
            ModuleReleaseMetaSpec {
                module_name: "serverless".to_string(),
                ..Default::default()
            },
        ));
        assert!(catalog
            .get_release_meta("kcp-system", "serverless")
            .await
            .unwrap()
            .is_some());
        assert!(catalog
            .get_release_meta("kcp-system", "keda")
            .await
            .unwrap()
            .is_none());
    }

    /// Story: callers depend on the trait, so a failing API server can be
    /// simulated without a cluster.
    #[tokio::test]
    async fn story_mocked_catalog_surfaces_transport_errors() {
        let mut catalog = MockModuleCatalog::new();
        catalog
            .expect_list_templates()
            .returning(|_| Err(Error::internal("connection reset")));

        let err = catalog.list_templates("kcp-system").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection reset"));
    }
}
