use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, ListParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use tracing::{debug, info, warn};

use awjob_core::appwrapper::{AppWrapper, CRD_NAME, GROUP, KIND, PLURAL, VERSION};

use crate::{JobAccessor, LookupError, LookupResult, DASHBOARD_SERVICE};

/// [`JobAccessor`] backed by the API server.
#[derive(Clone)]
pub struct KubeAccessor {
    client: Client,
    ar: ApiResource,
}

impl KubeAccessor {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk(GROUP, VERSION, KIND);
        Self { client, ar: ApiResource::from_gvk_with_plural(&gvk, PLURAL) }
    }

    /// Connects with the ambient kubeconfig or in-cluster credentials.
    pub async fn try_default() -> Result<Self, kube::Error> {
        let client = Client::try_default().await?;
        info!(group = GROUP, version = VERSION, "kube client ready");
        Ok(Self::new(client))
    }

    fn appwrappers(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &self.ar),
            None => Api::all_with(self.client.clone(), &self.ar),
        }
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

fn list_params(label_selector: &str) -> ListParams {
    let lp = ListParams::default();
    if label_selector.is_empty() { lp } else { lp.labels(label_selector) }
}

fn decode(obj: DynamicObject) -> LookupResult<AppWrapper> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

/// `http://<lb ingress>` when the service is exposed, else `http://<clusterIP>:<port>`.
fn service_url(svc: &Service) -> Option<String> {
    let ingress = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref()?.ingress.as_ref()?.first().cloned());
    if let Some(ing) = ingress {
        if let Some(host) = ing.ip.or(ing.hostname) {
            return Some(format!("http://{host}"));
        }
    }
    let spec = svc.spec.as_ref()?;
    let ip = spec.cluster_ip.as_deref().filter(|ip| !ip.is_empty() && *ip != "None")?;
    let port = spec.ports.as_ref()?.first()?.port;
    Some(format!("http://{ip}:{port}"))
}

#[async_trait::async_trait]
impl JobAccessor for KubeAccessor {
    async fn get_appwrapper(&self, namespace: &str, name: &str) -> LookupResult<AppWrapper> {
        match self.appwrappers(Some(namespace)).get(name).await {
            Ok(obj) => decode(obj),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(LookupError::not_found(namespace, name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_appwrappers(&self, namespace: Option<&str>, label_selector: &str) -> LookupResult<Vec<AppWrapper>> {
        let list = self.appwrappers(namespace).list(&list_params(label_selector)).await?;
        debug!(count = list.items.len(), selector = %label_selector, "listed appwrappers");
        list.items.into_iter().map(decode).collect()
    }

    async fn list_pods(&self, namespace: Option<&str>, label_selector: &str) -> LookupResult<Vec<Pod>> {
        let list = self.pods(namespace).list(&list_params(label_selector)).await?;
        debug!(count = list.items.len(), selector = %label_selector, "listed pods");
        Ok(list.items)
    }

    async fn crd_installed(&self) -> bool {
        let crds: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        match crds.get(CRD_NAME).await {
            Ok(_) => true,
            Err(e) => {
                debug!(crd = CRD_NAME, error = %e, "appwrapper CRD not available");
                false
            }
        }
    }

    async fn dashboard_url(&self, namespace: &str) -> Option<String> {
        let svcs: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        match svcs.get_opt(DASHBOARD_SERVICE).await {
            Ok(Some(svc)) => service_url(&svc),
            Ok(None) => None,
            Err(e) => {
                warn!(%namespace, error = %e, "dashboard lookup failed");
                None
            }
        }
    }
}
