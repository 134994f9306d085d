//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use hosting_router::config::loader::parse_config;
use hosting_router::config::schema::HostsConfig;
use hosting_router::hosting::{Builder, HostingManager, VirtualHosts};
use hosting_router::http::AdminServer;
use hosting_router::lifecycle::Shutdown;
use tokio::net::TcpListener;

pub const ADMIN_KEY: &str = "test-admin-key";

/// Two host groups sharing `www.example.com`:
///
/// ```text
/// dev:  localhost (root, alias "site")
///       com → example → www (root, alias "Site")
/// prod: com → example → www (root, alias "site")
///                              └ subsite (nl_NL) └ deep
///                     └ _default_ (root)
/// ```
pub const HOSTS_TOML: &str = r#"
[hosts]
default_host_name = "localhost"
locale = "en_US"
channel_manager_host_group = "dev"
prefix_exclusions = ["/ping/"]
suffix_exclusions = [".ico"]

[[sites]]
path = "/sites/example"
content_path = "/content/documents/example"

[[sites]]
path = "/sites/example-preview"
content_path = "/content/documents/example-preview"
canonical_content_path = "/content/documents/example"

[[sites]]
path = "/sites/dev"
content_path = "/content/documents/dev"

[[host_groups]]
name = "dev"

[[host_groups.hosts]]
name = "localhost"

[host_groups.hosts.root]
identifier = "dev-localhost"
alias = "site"
mount_point = "/sites/dev"

[[host_groups.hosts]]
name = "com"

[[host_groups.hosts.hosts]]
name = "example"

[[host_groups.hosts.hosts.hosts]]
name = "www"

[host_groups.hosts.hosts.hosts.root]
identifier = "dev-www"
alias = "Site"
mount_point = "/sites/dev"

[[host_groups]]
name = "prod"
cms_location = "https://cms.example.com"

[[host_groups.hosts]]
name = "com"
scheme = "https"

[[host_groups.hosts.hosts]]
name = "example"

[[host_groups.hosts.hosts.hosts]]
name = "www"

[host_groups.hosts.hosts.hosts.root]
identifier = "prod-www"
alias = "site"
mount_point = "/sites/example"
types = ["composer"]

[[host_groups.hosts.hosts.hosts.root.mounts]]
name = "subsite"
identifier = "prod-subsite"
locale = "nl_NL"

[[host_groups.hosts.hosts.hosts.root.mounts.mounts]]
name = "deep"
identifier = "prod-deep"

[[host_groups.hosts.hosts.hosts]]
name = "_default_"

[host_groups.hosts.hosts.hosts.root]
identifier = "prod-wildcard"
mount_point = "/sites/example"
"#;

pub fn hosts_config() -> HostsConfig {
    parse_config(HOSTS_TOML).unwrap()
}

pub fn build(config: &HostsConfig) -> VirtualHosts {
    Builder::new(config).build(1).unwrap()
}

pub fn build_toml(toml: &str) -> VirtualHosts {
    build(&parse_config(toml).unwrap())
}

/// Start the admin API on a loopback port.
pub async fn start_admin(manager: Arc<HostingManager>) -> (SocketAddr, Shutdown) {
    let mut config = hosts_config().admin;
    config.enabled = true;
    config.api_key = ADMIN_KEY.to_string();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = AdminServer::new(manager, config);
    let stop = shutdown.wait();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
