//! Abstracts the cluster reads/writes the admission hook performs behind a
//! trait, the same way the teacher's apiserver routes took a generic
//! `BottlerocketNodeClient` rather than calling `kube::Api` directly — it
//! lets the handler be exercised with a mock in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use eviction_autoscaler_types::{EvictionAutoScaler, EvictionRecord};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};

#[cfg_attr(any(feature = "mockall", test), mockall::automock)]
#[async_trait]
pub trait ClusterReader: Send + Sync {
    async fn pod_labels(&self, namespace: &str, pod_name: &str) -> kube::Result<Option<BTreeMap<String, String>>>;
    async fn list_pdbs(&self, namespace: &str) -> kube::Result<Vec<PodDisruptionBudget>>;
    async fn record_eviction(&self, namespace: &str, autoscaler_name: &str, record: EvictionRecord) -> kube::Result<()>;
}

#[derive(Clone)]
pub struct KubeClusterReader {
    pub client: Client,
}

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn pod_labels(&self, namespace: &str, pod_name: &str) -> kube::Result<Option<BTreeMap<String, String>>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.get_opt(pod_name).await?.map(|pod| pod.labels().clone()))
    }

    async fn list_pdbs(&self, namespace: &str) -> kube::Result<Vec<PodDisruptionBudget>> {
        let pdbs: Api<PodDisruptionBudget> = Api::namespaced(self.client.clone(), namespace);
        Ok(pdbs.list(&ListParams::default()).await?.items)
    }

    async fn record_eviction(&self, namespace: &str, autoscaler_name: &str, record: EvictionRecord) -> kube::Result<()> {
        let autoscalers: Api<EvictionAutoScaler> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "spec": { "lastEviction": record } });
        autoscalers
            .patch(autoscaler_name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
