//! Test utilities for pipeline scenarios
//!
//! `MockVcd` scripts a whole VMware Cloud Director instance: it answers
//! authentication traffic, serves canned JSON for every endpoint the happy
//! path touches, and records each call so tests can assert on compensation
//! order. Later registrations win, so a scenario overrides a single route
//! to inject its failure.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use vcd_preflight::api::{ApiClient, ApiError, ApiRequest, ApiResponse, Credentials, VcdSession};
use vcd_preflight::core::MigrationConfig;
use vcd_preflight::execution::PreflightEngine;
use vcd_preflight::persistence::FactStore;

pub const BASE: &str = "https://vcd.test";

struct Route {
    method: String,
    pattern: String,
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
}

/// A scripted VCD instance
#[derive(Clone)]
pub struct MockVcd {
    routes: Arc<Mutex<Vec<Route>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockVcd {
    pub fn new() -> Self {
        let mock = Self {
            routes: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        mock.install_default_routes();
        mock
    }

    /// Register a route; the last matching registration wins
    pub fn on(&self, method: &str, pattern: &str, status: u16, body: serde_json::Value) {
        self.routes.lock().unwrap().push(Route {
            method: method.to_string(),
            pattern: pattern.to_string(),
            status,
            body: body.to_string(),
            headers: Vec::new(),
        });
    }

    pub fn on_with_header(
        &self,
        method: &str,
        pattern: &str,
        status: u16,
        body: serde_json::Value,
        header: (&str, &str),
    ) {
        self.routes.lock().unwrap().push(Route {
            method: method.to_string(),
            pattern: pattern.to_string(),
            status,
            body: body.to_string(),
            headers: vec![(header.0.to_string(), header.1.to_string())],
        });
    }

    /// All calls recorded so far as `METHOD url` strings
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls matching a method and URL fragment
    pub fn call_count(&self, method: &str, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(method) && call.contains(pattern))
            .count()
    }

    /// Index of the first call matching a method and URL fragment
    pub fn call_position(&self, method: &str, pattern: &str) -> Option<usize> {
        self.calls()
            .iter()
            .position(|call| call.starts_with(method) && call.contains(pattern))
    }

    fn install_default_routes(&self) {
        // Authentication plumbing
        self.on_with_header(
            "POST",
            "/api/sessions",
            200,
            json!({}),
            ("x-vmware-vcloud-access-token", "token-1"),
        );
        self.on("GET", "/api/session", 200, json!({}));
        self.on("GET", "/cloudapi/1.0.0/sessions/current", 200, json!({"id": "sess-1"}));
        self.on("DELETE", "/cloudapi/1.0.0/sessions/sess-1", 204, json!({}));

        // Organization and source org VDC
        self.on(
            "GET",
            "/api/admin",
            200,
            json!({
                "organizationReferences": [
                    {"name": "ACME", "href": format!("{}/api/admin/org/1", BASE)}
                ]
            }),
        );
        self.on(
            "GET",
            "/api/admin/org/1",
            200,
            json!({
                "name": "ACME",
                "vdcs": [
                    {"name": "v-CokeOVDC", "href": format!("{}/api/admin/vdc/src", BASE)}
                ]
            }),
        );
        self.on("GET", "/api/admin/vdc/src", 200, source_org_vdc(true, false));

        // External networks (one listing serves all three fetches)
        self.on(
            "GET",
            "/cloudapi/1.0.0/externalNetworks",
            200,
            json!({
                "resultTotal": 3,
                "values": [
                    external_network("ext-net-v", "PORTGROUP", "10.1.1.1", 24),
                    external_network("ext-net-t", "NSXT_TIER0", "10.1.1.1", 24),
                    external_network("dummy-net", "PORTGROUP", "172.16.1.1", 24)
                ]
            }),
        );
        self.on(
            "GET",
            "edgeGatewayUplinks.uplinkId==",
            200,
            json!({"resultTotal": 1, "values": [
                {"id": "urn:vcloud:gateway:other", "name": "other-edge",
                 "edgeGatewayUplinks": [{"dedicated": false}]}
            ]}),
        );

        // Provider VDCs
        self.on(
            "GET",
            "/cloudapi/1.0.0/providerVdcs",
            200,
            json!({
                "resultTotal": 2,
                "values": [
                    {"id": "urn:vcloud:providervdc:v", "name": "nsxv-pvdc", "nsxTManager": null},
                    {"id": "urn:vcloud:providervdc:t", "name": "nsxt-pvdc",
                     "nsxTManager": {"name": "nsxt-mgr", "href": ""}}
                ]
            }),
        );
        self.on("GET", "/api/admin/providervdc/v", 200, provider_vdc("nsxv-pvdc", "v", 13));
        self.on("GET", "/api/admin/providervdc/t", 200, provider_vdc("nsxt-pvdc", "t", 14));

        // Network pool backing the source org VDC
        self.on(
            "GET",
            "/api/admin/extension/networkPool/np1",
            200,
            json!({"name": "vxlan-pool", "poolType": "VXLAN"}),
        );

        // Source org VDC disable / enable
        self.on("POST", "/api/admin/vdc/src/action/disable", 204, json!({}));
        self.on("POST", "/api/admin/vdc/src/action/enable", 204, json!({}));

        // Compute policies
        self.on(
            "GET",
            "/api/admin/vdc/src/computePolicyReferences",
            200,
            json!({"vdcComputePolicyReference": [
                {"name": "System Default", "href": format!("{}/cloudapi/1.0.0/vdcComputePolicies/sysdef", BASE)}
            ]}),
        );
        self.on(
            "GET",
            "/cloudapi/1.0.0/vdcComputePolicies",
            200,
            json!({"resultTotal": 0, "values": []}),
        );

        // Affinity rules and their update task
        self.on(
            "GET",
            "/api/vdc/src/vmAffinityRules",
            200,
            json!({"vmAffinityRule": [affinity_rule("r1", "keep-apart", true)]}),
        );
        self.on_with_header(
            "PUT",
            "/api/vmAffinityRule/r1",
            202,
            json!({}),
            ("location", "https://vcd.test/api/task/affinity-1"),
        );
        self.on(
            "GET",
            "/api/task/affinity-1",
            200,
            json!({"operationName": "affinityRuleUpdate", "status": "success"}),
        );

        // Edge gateway of the source org VDC
        self.on(
            "GET",
            "orgVdc.id==urn:vcloud:vdc:src",
            200,
            json!({"resultTotal": 1, "values": [
                {"id": "urn:vcloud:gateway:edge1", "name": "edge-1", "edgeGatewayUplinks": []}
            ]}),
        );

        // Org VDC networks
        self.on(
            "GET",
            "/cloudapi/1.0.0/orgVdcNetworks",
            200,
            json!({"resultTotal": 1, "values": [
                {"id": "urn:vcloud:network:n1", "name": "app-net", "networkType": "NAT_ROUTED",
                 "shared": false, "orgVdc": {"id": "urn:vcloud:vdc:src"}}
            ]}),
        );

        // Edge gateway services; sub-path routes registered after their
        // parents so the later, more specific registration wins
        self.on(
            "GET",
            "/network/edges/edge1/dhcp/config",
            200,
            json!({"enabled": false, "staticBindings": null}),
        );
        self.on("GET", "/network/edges/edge1/dhcp/config/relay", 200, json!({"relay": null}));
        self.on(
            "GET",
            "/network/edges/edge1/firewall/config",
            200,
            json!({"enabled": true, "firewallRules": {"firewallRule": [
                {"id": "fw-1", "ruleType": "user", "action": "accept",
                 "application": {"service": {"protocol": "tcp", "port": "443"}}}
            ]}}),
        );
        self.on(
            "GET",
            "/network/edges/edge1/nat/config",
            200,
            json!({"nat64Rules": null, "natRules": {"natRule": [
                {"ruleId": "196609", "action": "snat", "translatedAddress": "203.0.113.9"}
            ]}}),
        );
        self.on(
            "GET",
            "/network/edges/edge1/ipsec/config",
            200,
            // A bare record instead of a sequence, as the source system emits
            json!({"sites": {"site": {
                "name": "site-a", "ipsecSessionType": "policybasedsession",
                "encryptionAlgorithm": "aes256", "authenticationMode": "psk",
                "digestAlgorithm": "sha1"
            }}}),
        );
        self.on(
            "GET",
            "/network/edges/edge1/routing/config",
            200,
            json!({"ospf": {"enabled": false}, "staticRouting": {}}),
        );
        self.on(
            "GET",
            "/network/edges/edge1/routing/config/bgp",
            200,
            json!({"enabled": true, "localAS": 65001}),
        );
        self.on("GET", "/network/edges/edge1/loadbalancer/config", 200, json!({"enabled": false}));
        self.on("GET", "/network/edges/edge1/l2vpn/config", 200, json!({"enabled": false}));
        self.on("GET", "/network/edges/edge1/sslvpn/config", 200, json!({"enabled": false}));
        self.on(
            "GET",
            "/api/admin/edgeGateway/edge1",
            200,
            json!({"configuration": {"useDefaultRouteForDnsRelay": false}}),
        );
    }
}

#[async_trait]
impl ApiClient for MockVcd {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let method = format!("{}", request.method);
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", method, request.url));
        let routes = self.routes.lock().unwrap();
        let route = routes
            .iter()
            .rev()
            .find(|route| route.method == method && request.url.contains(&route.pattern));
        match route {
            Some(route) => {
                let mut response = ApiResponse::new(route.status, route.body.clone());
                for (name, value) in &route.headers {
                    response = response.with_header(name.clone(), value.clone());
                }
                Ok(response)
            }
            None => Ok(ApiResponse::new(
                404,
                json!({"message": format!("no route for {} {}", method, request.url)}).to_string(),
            )),
        }
    }
}

/// The source org VDC record served by the mock
pub fn source_org_vdc(enabled: bool, fast_provisioned: bool) -> serde_json::Value {
    json!({
        "id": "urn:vcloud:vdc:src",
        "name": "v-CokeOVDC",
        "isEnabled": enabled,
        "usesFastProvisioning": fast_provisioned,
        "vdcStorageProfiles": [{"name": "gold", "href": ""}],
        "providerVdcReference": {"id": "urn:vcloud:providervdc:v", "name": "nsxv-pvdc", "href": ""},
        "networkPoolReference": {"name": "vxlan-pool",
                                 "href": format!("{}/api/admin/extension/networkPool/np1", BASE)}
    })
}

pub fn external_network(
    name: &str,
    backing: &str,
    gateway: &str,
    prefix: u8,
) -> serde_json::Value {
    json!({
        "id": format!("urn:vcloud:network:{}", name),
        "name": name,
        "networkBackings": {"values": [{"backingType": backing}]},
        "subnets": {"values": [{"gateway": gateway, "prefixLength": prefix}]}
    })
}

pub fn provider_vdc(name: &str, id_suffix: &str, hardware: u8) -> serde_json::Value {
    json!({
        "id": format!("urn:vcloud:providervdc:{}", id_suffix),
        "name": name,
        "isEnabled": true,
        "storageProfiles": [{"name": "gold", "href": ""}],
        "capabilities": {"supportedHardwareVersions": [
            {"name": format!("vmx-{}", hardware)}
        ]}
    })
}

pub fn affinity_rule(id_suffix: &str, name: &str, enabled: bool) -> serde_json::Value {
    json!({
        "id": format!("urn:vcloud:affinityRule:{}", id_suffix),
        "name": name,
        "isEnabled": enabled,
        "isMandatory": false,
        "polarity": "Affinity",
        "vmReferences": []
    })
}

/// Migration config pointed at the mock instance
pub fn test_config(facts_path: &std::path::Path) -> MigrationConfig {
    let yaml = format!(
        r#"
vcd:
  endpoint: "{}"
  username: "administrator"
  password: "secret"
organization: "ACME"
source_org_vdc: "v-CokeOVDC"
nsxv_provider_vdc:
  name: "nsxv-pvdc"
  external_network: "ext-net-v"
  dummy_external_network: "dummy-net"
nsxt_provider_vdc:
  name: "nsxt-pvdc"
  external_network: "ext-net-t"
timeouts:
  task_deadline_secs: 2
  poll_interval_secs: 1
facts_path: "{}"
"#,
        BASE,
        facts_path.display()
    );
    MigrationConfig::from_yaml(&yaml).unwrap()
}

/// Build an engine wired to the mock, returning both
pub fn engine_with(mock: MockVcd, dir: &tempfile::TempDir) -> PreflightEngine<MockVcd> {
    let facts_path = dir.path().join("facts.json");
    let config = test_config(&facts_path);
    let session = VcdSession::new(
        mock,
        BASE,
        Credentials::new("administrator", "secret"),
    );
    let store = FactStore::new(&facts_path);
    PreflightEngine::new(session, store, config)
}
