//! Mount nodes.
//!
//! # Responsibilities
//! - Represent one segment of a path shaped mount tree (`""`, `/subsite`)
//! - Hold the resolved [`MountProperties`]
//! - Derive content paths from the site root the mount point targets
//!
//! # Design Decisions
//! - Content paths are derived once, when the mount is built
//! - Editorial locks are not stored here; see [`MountLocks`](crate::hosting::MountLocks)
//! - A mapped mount must target a known site root, an unmapped one may
//!   point anywhere absolute

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::config::schema::{MountConfig, SiteRootConfig};
use crate::hosting::error::ConfigurationError;
use crate::hosting::properties::{MountProperties, PREVIEW_TYPE};
use crate::hosting::tree::{HostId, MountId};

/// A site root a mount point can refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRoot {
    pub content_path: String,
    pub canonical_content_path: String,
}

/// Site roots by absolute path.
#[derive(Debug, Clone, Default)]
pub struct SiteRoots(HashMap<String, SiteRoot>);

impl SiteRoots {
    pub fn from_config(sites: &[SiteRootConfig]) -> Self {
        let roots = sites
            .iter()
            .map(|site| {
                let root = SiteRoot {
                    content_path: site.content_path.clone(),
                    canonical_content_path: site
                        .canonical_content_path
                        .clone()
                        .unwrap_or_else(|| site.content_path.clone()),
                };
                (site.path.clone(), root)
            })
            .collect();
        Self(roots)
    }

    pub fn get(&self, path: &str) -> Option<&SiteRoot> {
        self.0.get(path)
    }
}

/// Live and preview content locations of a mount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentPaths {
    pub content_path: Option<String>,
    pub canonical_content_path: Option<String>,
    pub preview_content_path: Option<String>,
    pub preview_canonical_content_path: Option<String>,
}

impl ContentPaths {
    fn derive(
        props: &MountProperties,
        preview_mount_point: Option<&str>,
        sites: &SiteRoots,
        warnings: &mut Vec<ConfigurationError>,
    ) -> Result<Self, ConfigurationError> {
        let Some(mount_point) = props.mount_point.as_deref() else {
            return Ok(Self::default());
        };
        if !mount_point.starts_with('/') {
            return Err(ConfigurationError::RelativeMountPoint {
                mount_point: mount_point.to_string(),
            });
        }

        if !props.is_mapped {
            let (content, canonical) = match sites.get(mount_point) {
                Some(site) => (site.content_path.clone(), site.canonical_content_path.clone()),
                None => (mount_point.to_string(), mount_point.to_string()),
            };
            return Ok(Self::same_for_preview(content, canonical));
        }

        let site = sites
            .get(mount_point)
            .ok_or_else(|| ConfigurationError::UnknownSiteRoot {
                mount_point: mount_point.to_string(),
            })?;

        let is_preview = props.types().contains(&PREVIEW_TYPE);
        let preview_site = preview_mount_point
            .filter(|_| !is_preview)
            .and_then(|p| sites.get(p));

        match preview_site {
            Some(preview) => Ok(Self {
                content_path: Some(site.content_path.clone()),
                canonical_content_path: Some(site.canonical_content_path.clone()),
                preview_content_path: Some(preview.content_path.clone()),
                preview_canonical_content_path: Some(preview.canonical_content_path.clone()),
            }),
            None => {
                if !is_preview {
                    warnings.push(ConfigurationError::MissingPreviewSite {
                        preview_mount_point: preview_mount_point.unwrap_or_default().to_string(),
                    });
                }
                Ok(Self::same_for_preview(
                    site.content_path.clone(),
                    site.canonical_content_path.clone(),
                ))
            }
        }
    }

    fn same_for_preview(content: String, canonical: String) -> Self {
        Self {
            preview_content_path: Some(content.clone()),
            preview_canonical_content_path: Some(canonical.clone()),
            content_path: Some(content),
            canonical_content_path: Some(canonical),
        }
    }
}

/// Identifier of a mount that configures none. Stable across builds as
/// long as the mount keeps its place in the tree.
fn derived_identifier(placement: &MountPlacement<'_>, mount_path: &str) -> String {
    let name = format!(
        "{}/{}:{}{}",
        placement.host_group, placement.host_name, placement.port, mount_path
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Where a mount is attached while it is being built.
#[derive(Debug, Clone, Copy)]
pub struct MountPlacement<'a> {
    pub virtual_host: HostId,
    /// Full name of the virtual host, e.g. `www.example.com`.
    pub host_name: &'a str,
    pub host_group: &'a str,
    pub port: u16,
    /// Parent mount and its mount path; `None` for a root mount.
    pub parent: Option<(MountId, &'a str)>,
}

/// One node of a mount tree.
#[derive(Debug, Clone)]
pub struct Mount {
    pub(crate) id: MountId,
    pub(crate) name: String,
    pub(crate) identifier: String,
    pub(crate) alias: Option<String>,
    pub(crate) mount_path: String,
    pub(crate) parent: Option<MountId>,
    pub(crate) children: HashMap<String, MountId>,
    pub(crate) virtual_host: HostId,
    pub(crate) host_group: String,
    pub(crate) port: u16,
    pub(crate) properties: MountProperties,
    pub(crate) preview_mount_point: Option<String>,
    pub(crate) content: ContentPaths,
    pub(crate) custom_properties: BTreeMap<String, String>,
}

impl Mount {
    /// Build a detached mount from its configuration node and the
    /// resolved properties of whatever it inherits from.
    pub fn build(
        config: &MountConfig,
        inherited: &MountProperties,
        placement: MountPlacement<'_>,
        sites: &SiteRoots,
        warnings: &mut Vec<ConfigurationError>,
    ) -> Result<Self, ConfigurationError> {
        let properties = inherited.inherit(config, warnings);

        let preview_mount_point = properties.mount_point.as_ref().map(|mp| {
            if properties.mount_type == PREVIEW_TYPE {
                mp.clone()
            } else {
                format!("{}-{}", mp, PREVIEW_TYPE)
            }
        });

        let content = ContentPaths::derive(&properties, preview_mount_point.as_deref(), sites, warnings)?;

        let mount_path = match placement.parent {
            Some((_, parent_path)) => format!("{}/{}", parent_path, config.name),
            None => String::new(),
        };

        Ok(Self {
            id: MountId(usize::MAX),
            name: config.name.clone(),
            identifier: config
                .identifier
                .clone()
                .unwrap_or_else(|| derived_identifier(&placement, &mount_path)),
            alias: config.alias.as_ref().map(|a| a.to_lowercase()),
            mount_path,
            parent: placement.parent.map(|(id, _)| id),
            children: HashMap::new(),
            virtual_host: placement.virtual_host,
            host_group: placement.host_group.to_string(),
            port: placement.port,
            properties,
            preview_mount_point,
            content,
            custom_properties: config.properties.clone(),
        })
    }

    pub fn id(&self) -> MountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque identifier, unique across the registry.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Lowercased alias used for alias/type lookup.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// `""` for a root mount, else the parent's path + `/` + name.
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    pub fn parent_id(&self) -> Option<MountId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn child_mount_id(&self, name: &str) -> Option<MountId> {
        self.children.get(name).copied()
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn virtual_host_id(&self) -> HostId {
        self.virtual_host
    }

    pub fn host_group_name(&self) -> &str {
        &self.host_group
    }

    /// Port of the port mount this tree hangs under; 0 for any port.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn properties(&self) -> &MountProperties {
        &self.properties
    }

    pub fn mount_point(&self) -> Option<&str> {
        self.properties.mount_point.as_deref()
    }

    pub fn preview_mount_point(&self) -> Option<&str> {
        self.preview_mount_point.as_deref()
    }

    pub fn content_paths(&self) -> &ContentPaths {
        &self.content
    }

    pub fn content_path(&self) -> Option<&str> {
        self.content.content_path.as_deref()
    }

    pub fn canonical_content_path(&self) -> Option<&str> {
        self.content.canonical_content_path.as_deref()
    }

    pub fn preview_content_path(&self) -> Option<&str> {
        self.content.preview_content_path.as_deref()
    }

    pub fn preview_canonical_content_path(&self) -> Option<&str> {
        self.content.preview_canonical_content_path.as_deref()
    }

    pub fn mount_type(&self) -> &str {
        &self.properties.mount_type
    }

    /// Primary type first, then additional types.
    pub fn types(&self) -> Vec<&str> {
        self.properties.types()
    }

    pub fn is_of_type(&self, mount_type: &str) -> bool {
        self.types().contains(&mount_type)
    }

    pub fn is_preview(&self) -> bool {
        self.is_of_type(PREVIEW_TYPE)
    }

    pub fn is_mapped(&self) -> bool {
        self.properties.is_mapped
    }

    pub fn is_site(&self) -> bool {
        self.properties.is_site
    }

    pub fn locale(&self) -> Option<&str> {
        self.properties.locale.as_deref()
    }

    pub fn scheme(&self) -> &str {
        &self.properties.scheme
    }

    pub fn only_for_context_path(&self) -> Option<&str> {
        self.properties.only_for_context_path.as_deref()
    }

    pub fn named_pipeline(&self) -> Option<&str> {
        self.properties.named_pipeline.as_deref()
    }

    /// A free-form mount property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.custom_properties.get(name).map(String::as_str)
    }

    pub fn custom_properties(&self) -> &BTreeMap<String, String> {
        &self.custom_properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::HostsSection;
    use crate::hosting::properties::HostProperties;

    fn sites() -> SiteRoots {
        SiteRoots::from_config(&[
            SiteRootConfig {
                path: "/sites/example".into(),
                content_path: "/content/example".into(),
                canonical_content_path: None,
            },
            SiteRootConfig {
                path: "/sites/example-preview".into(),
                content_path: "/content/example-preview".into(),
                canonical_content_path: Some("/content/example".into()),
            },
        ])
    }

    fn root_props() -> MountProperties {
        let host = HostProperties::from_defaults(&HostsSection::default(), &mut Vec::new());
        MountProperties::from_host(&host)
    }

    fn placement<'a>() -> MountPlacement<'a> {
        MountPlacement {
            virtual_host: HostId(0),
            host_name: "www.example.com",
            host_group: "prod",
            port: 0,
            parent: None,
        }
    }

    #[test]
    fn test_mapped_mount_derives_live_and_preview_content() {
        let config = MountConfig {
            mount_point: Some("/sites/example".into()),
            alias: Some("Main".into()),
            ..MountConfig::default()
        };
        let mut warnings = Vec::new();
        let mount = Mount::build(&config, &root_props(), placement(), &sites(), &mut warnings).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(mount.mount_path(), "");
        assert_eq!(mount.alias(), Some("main"));
        assert_eq!(mount.preview_mount_point(), Some("/sites/example-preview"));
        assert_eq!(mount.content_path(), Some("/content/example"));
        assert_eq!(mount.preview_content_path(), Some("/content/example-preview"));
        assert_eq!(mount.preview_canonical_content_path(), Some("/content/example"));
        assert!(!mount.identifier().is_empty());
    }

    #[test]
    fn test_preview_mount_uses_own_mount_point() {
        let config = MountConfig {
            mount_point: Some("/sites/example".into()),
            mount_type: Some("preview".into()),
            ..MountConfig::default()
        };
        let mut warnings = Vec::new();
        let mount = Mount::build(&config, &root_props(), placement(), &sites(), &mut warnings).unwrap();

        assert!(mount.is_preview());
        assert_eq!(mount.preview_mount_point(), Some("/sites/example"));
        assert_eq!(mount.preview_content_path(), Some("/content/example"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unconfigured_identifier_is_stable_per_place() {
        let config = MountConfig::default();
        let first = Mount::build(&config, &root_props(), placement(), &sites(), &mut Vec::new()).unwrap();
        let again = Mount::build(&config, &root_props(), placement(), &sites(), &mut Vec::new()).unwrap();
        assert_eq!(first.identifier(), again.identifier());

        let other_port = MountPlacement { port: 8080, ..placement() };
        let moved = Mount::build(&config, &root_props(), other_port, &sites(), &mut Vec::new()).unwrap();
        assert_ne!(first.identifier(), moved.identifier());

        let named = MountConfig {
            identifier: Some("main".into()),
            ..MountConfig::default()
        };
        let named = Mount::build(&named, &root_props(), placement(), &sites(), &mut Vec::new()).unwrap();
        assert_eq!(named.identifier(), "main");
    }

    #[test]
    fn test_relative_mount_point_fails() {
        let config = MountConfig {
            mount_point: Some("sites/example".into()),
            ..MountConfig::default()
        };
        let err = Mount::build(&config, &root_props(), placement(), &sites(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigurationError::RelativeMountPoint { .. }));
    }

    #[test]
    fn test_mapped_mount_needs_site_root() {
        let config = MountConfig {
            mount_point: Some("/sites/unknown".into()),
            ..MountConfig::default()
        };
        let err = Mount::build(&config, &root_props(), placement(), &sites(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownSiteRoot { .. }));
    }

    #[test]
    fn test_unmapped_mount_uses_mount_point_as_content() {
        let config = MountConfig {
            mount_point: Some("/content/assets".into()),
            is_mapped: Some(false),
            named_pipeline: Some("RestApiPipeline".into()),
            ..MountConfig::named("api")
        };
        let parent = Some((MountId(0), "/site"));
        let placement = MountPlacement { parent, ..placement() };
        let mount = Mount::build(&config, &root_props(), placement, &sites(), &mut Vec::new()).unwrap();

        assert_eq!(mount.mount_path(), "/site/api");
        assert_eq!(mount.content_path(), Some("/content/assets"));
        assert_eq!(mount.named_pipeline(), Some("RestApiPipeline"));
        assert!(!mount.is_mapped());
    }

    #[test]
    fn test_missing_preview_site_warns() {
        let sites = SiteRoots::from_config(&[SiteRootConfig {
            path: "/sites/other".into(),
            content_path: "/content/other".into(),
            canonical_content_path: None,
        }]);
        let config = MountConfig {
            mount_point: Some("/sites/other".into()),
            ..MountConfig::default()
        };
        let mut warnings = Vec::new();
        let mount = Mount::build(&config, &root_props(), placement(), &sites, &mut warnings).unwrap();
        assert_eq!(mount.preview_content_path(), Some("/content/other"));
        assert!(matches!(warnings[0], ConfigurationError::MissingPreviewSite { .. }));
    }

    #[test]
    fn test_no_mount_point_no_content() {
        let mount = Mount::build(&MountConfig::default(), &root_props(), placement(), &sites(), &mut Vec::new()).unwrap();
        assert_eq!(mount.mount_point(), None);
        assert_eq!(mount.preview_mount_point(), None);
        assert_eq!(mount.content_path(), None);
    }
}
