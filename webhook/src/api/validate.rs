//! The `/validate-eviction` handler (SPEC_FULL §4.5). Despite the route name
//! this hook never denies an eviction; it only records blocked (or
//! potentially blocked) attempts onto the paired `AutoScaler` so the control
//! loop picks them up on its next cycle.

use std::sync::Arc;

use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use eviction_autoscaler_types::EvictionRecord;
use k8s_openapi::api::policy::v1::Eviction;
use kube::core::admission::AdmissionResponse;
use kube::ResourceExt;
use tracing::{instrument, warn};

use crate::admission::{any_denies_eviction, matching_pdbs, EvictionAdmissionReview};
use crate::client::ClusterReader;

#[post("/validate-eviction")]
#[instrument(skip(reader, review), fields(pod = tracing::field::Empty, namespace = tracing::field::Empty))]
pub async fn validate_eviction(
    reader: web::Data<Arc<dyn ClusterReader>>,
    review: web::Json<EvictionAdmissionReview>,
) -> HttpResponse {
    let review = review.into_inner();

    let request = match review.request.clone() {
        Some(request) => request,
        None => {
            return HttpResponse::Ok().json(AdmissionResponse::invalid("missing admission request").into_review::<Eviction>())
        }
    };

    let response = AdmissionResponse::from(&request);

    let namespace = match request.namespace.clone() {
        Some(namespace) => namespace,
        None => {
            warn!(name = %request.name, "eviction admission request carried no namespace");
            return HttpResponse::Ok().json(response.into_review::<Eviction>());
        }
    };

    tracing::Span::current().record("pod", request.name.as_str());
    tracing::Span::current().record("namespace", namespace.as_str());

    if let Err(err) = record_blocked_eviction(reader.as_ref().as_ref(), &namespace, &request.name).await {
        warn!(error = %err, pod = %request.name, namespace, "failed to record eviction on paired AutoScaler");
    }

    HttpResponse::Ok().json(response.into_review::<Eviction>())
}

async fn record_blocked_eviction(reader: &dyn ClusterReader, namespace: &str, pod_name: &str) -> kube::Result<()> {
    let Some(pod_labels) = reader.pod_labels(namespace, pod_name).await? else {
        warn!(pod_name, namespace, "evicted pod not found; skipping PDB lookup");
        return Ok(());
    };

    let pdbs = reader.list_pdbs(namespace).await?;
    let matched = matching_pdbs(&pod_labels, &pdbs);

    if !any_denies_eviction(&matched) {
        return Ok(());
    }

    for pdb in matched
        .iter()
        .filter(|pdb| pdb.status.as_ref().map(|s| s.disruptions_allowed) == Some(0))
    {
        let autoscaler_name = pdb.name_any();
        let record = EvictionRecord::new(pod_name, Utc::now());
        if let Err(err) = reader.record_eviction(namespace, &autoscaler_name, record).await {
            warn!(error = %err, autoscaler = %autoscaler_name, "failed to patch AutoScaler with blocked eviction");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClusterReader;
    use actix_web::{test, App};
    use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec, PodDisruptionBudgetStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use kube::core::admission::{AdmissionRequest, Operation};
    use maplit::btreemap;

    fn test_review(namespace: Option<&str>) -> EvictionAdmissionReview {
        EvictionAdmissionReview {
            types: Default::default(),
            request: Some(AdmissionRequest {
                uid: "test-uid".to_string(),
                name: "web-abc123".to_string(),
                namespace: namespace.map(str::to_string),
                operation: Operation::Create,
                ..AdmissionRequest::default()
            }),
            response: None,
        }
    }

    #[actix_web::test]
    async fn always_allows_even_with_no_pdbs() {
        let mut reader = MockClusterReader::new();
        reader.expect_pod_labels().returning(|_, _| {
            Ok(Some(btreemap! { "app".to_string() => "web".to_string() }))
        });
        reader.expect_list_pdbs().returning(|_| Ok(vec![]));

        let reader: Arc<dyn ClusterReader> = Arc::new(reader);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(reader))
                .service(validate_eviction),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/validate-eviction")
            .set_json(&test_review(Some("default")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn records_eviction_when_pdb_blocks() {
        let mut reader = MockClusterReader::new();
        reader.expect_pod_labels().returning(|_, _| {
            Ok(Some(btreemap! { "app".to_string() => "web".to_string() }))
        });
        reader.expect_list_pdbs().returning(|_| {
            Ok(vec![PodDisruptionBudget {
                metadata: ObjectMeta {
                    name: Some("web-pdb".to_string()),
                    ..Default::default()
                },
                spec: Some(PodDisruptionBudgetSpec {
                    selector: Some(LabelSelector {
                        match_labels: Some(btreemap! { "app".to_string() => "web".to_string() }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                status: Some(PodDisruptionBudgetStatus {
                    disruptions_allowed: 0,
                    ..Default::default()
                }),
            }])
        });
        reader
            .expect_record_eviction()
            .withf(|_, name, _| name == "web-pdb")
            .returning(|_, _, _| Ok(()));

        let reader: Arc<dyn ClusterReader> = Arc::new(reader);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(reader))
                .service(validate_eviction),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/validate-eviction")
            .set_json(&test_review(Some("default")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn allows_when_request_has_no_namespace() {
        let reader: Arc<dyn ClusterReader> = Arc::new(MockClusterReader::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(reader))
                .service(validate_eviction),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/validate-eviction")
            .set_json(&test_review(None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
