// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Installs the `LoadBalancer` CRD on startup.
//!
//! Uses server-side apply with the controller as field manager, so repeated
//! starts converge the CRD to the schema compiled into this binary, then waits
//! for the API server to report it `Established` before any watch is started.

use crate::constants::{CONTROLLER_NAME, LOAD_BALANCER_CRD_NAME};
use crate::crd::LoadBalancer;
use crate::errors::ControllerError;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Client, CustomResourceExt};
use std::time::Duration;
use tracing::info;

/// How long to wait for the CRD to become `Established`
pub const CRD_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// Create or update the `LoadBalancer` CRD and wait until it is served.
///
/// # Errors
/// Returns [`ControllerError::CrdInstall`] if the apply is rejected and
/// [`ControllerError::CrdNotEstablished`] if the CRD is not established in time
pub async fn ensure_load_balancer_crd(client: &Client) -> Result<(), ControllerError> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(CONTROLLER_NAME).force();

    info!(crd = LOAD_BALANCER_CRD_NAME, "Installing CRD");
    crds.patch(
        LOAD_BALANCER_CRD_NAME,
        &params,
        &Patch::Apply(&LoadBalancer::crd()),
    )
    .await
    .map_err(|source| ControllerError::CrdInstall {
        name: LOAD_BALANCER_CRD_NAME.to_string(),
        source,
    })?;

    let established = await_condition(
        crds,
        LOAD_BALANCER_CRD_NAME,
        conditions::is_crd_established(),
    );
    match tokio::time::timeout(CRD_ESTABLISH_TIMEOUT, established).await {
        Ok(Ok(_)) => {
            info!(crd = LOAD_BALANCER_CRD_NAME, "CRD established");
            Ok(())
        }
        Ok(Err(_)) | Err(_) => Err(ControllerError::CrdNotEstablished(
            LOAD_BALANCER_CRD_NAME.to_string(),
        )),
    }
}
