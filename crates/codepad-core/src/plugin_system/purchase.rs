use std::sync::Arc;

use async_trait::async_trait;

use crate::plugin_system::error::{PluginResult, PluginSystemError};
use crate::plugin_system::manifest::RemoteManifest;
use crate::plugin_system::remote::{PluginOrder, PluginRegistryClient};
use crate::ui_bridge::InstallUi;

/// A store product
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub product_id: String,
    /// Store-specific payload handed back to [`PurchaseProvider::purchase`]
    pub details: serde_json::Value,
}

/// A completed purchase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub product_ids: Vec<String>,
    pub purchase_token: String,
}

/// In-app purchase / licensing collaborator
#[async_trait]
pub trait PurchaseProvider: Send + Sync {
    async fn get_product(&self, sku: &str) -> PluginResult<Option<Product>>;

    /// Run the purchase flow; resolves once the store reports the purchase
    async fn purchase(&self, product: &Product) -> PluginResult<()>;

    async fn get_purchases(&self) -> PluginResult<Vec<Purchase>>;
}

/// Purchase provider for hosts without a store: nothing is ever owned and
/// every purchase fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

#[async_trait]
impl PurchaseProvider for NoStore {
    async fn get_product(&self, _sku: &str) -> PluginResult<Option<Product>> {
        Ok(None)
    }

    async fn purchase(&self, product: &Product) -> PluginResult<()> {
        Err(PluginSystemError::PurchaseFailed {
            plugin_id: product.product_id.clone(),
            message: "no store available".to_string(),
        })
    }

    async fn get_purchases(&self) -> PluginResult<Vec<Purchase>> {
        Ok(Vec::new())
    }
}

/// Decides whether a dependency may be installed and with which purchase token
pub struct PurchaseGate {
    store: Arc<dyn PurchaseProvider>,
    registry: Arc<dyn PluginRegistryClient>,
    ui: Arc<dyn InstallUi>,
    package_name: String,
}

impl PurchaseGate {
    pub fn new(
        store: Arc<dyn PurchaseProvider>,
        registry: Arc<dyn PluginRegistryClient>,
        ui: Arc<dyn InstallUi>,
        package_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            ui,
            package_name: package_name.into(),
        }
    }

    async fn find_token(&self, product_id: &str) -> PluginResult<Option<String>> {
        let purchases = self.store.get_purchases().await?;
        Ok(purchases
            .into_iter()
            .find(|p| p.product_ids.iter().any(|id| id == product_id))
            .map(|p| p.purchase_token))
    }

    /// Purchase token to install `manifest` with.
    ///
    /// Free plugins resolve to an existing token if one is owned, otherwise
    /// `None`. Paid plugins without a token go through the purchase flow.
    pub async fn entitlement(&self, manifest: &RemoteManifest) -> PluginResult<Option<String>> {
        let plugin_id = manifest.id().to_string();
        let purchase_failed = |message: String| PluginSystemError::PurchaseFailed {
            plugin_id: plugin_id.clone(),
            message,
        };

        let product = match manifest.sku.as_deref() {
            Some(sku) => match self.store.get_product(sku).await {
                Ok(product) => product,
                Err(e) if manifest.is_paid() => return Err(purchase_failed(e.to_string())),
                Err(e) => {
                    log::warn!("Product lookup for free plugin '{}' failed: {}", plugin_id, e);
                    None
                }
            },
            None => None,
        };

        let mut token = match &product {
            Some(product) => self
                .find_token(&product.product_id)
                .await
                .map_err(|e| purchase_failed(e.to_string()))?,
            None => None,
        };

        if manifest.is_paid() && token.is_none() {
            let Some(product) = product else {
                return Err(PluginSystemError::PurchaseRequired { plugin_id });
            };

            if !self.registry.api_status().await {
                self.ui.alert("Error", "Unable to reach the plugin registry. Try again later.");
                return Err(purchase_failed("registry unavailable".to_string()));
            }

            log::info!("Purchasing dependency '{}'", plugin_id);
            self.ui.set_loader_message("Loading...");
            self.store
                .purchase(&product)
                .await
                .map_err(|e| purchase_failed(e.to_string()))?;

            let purchased = self
                .find_token(&product.product_id)
                .await
                .map_err(|e| purchase_failed(e.to_string()))?
                .ok_or_else(|| purchase_failed("store returned no purchase token".to_string()))?;

            self.registry
                .place_order(&PluginOrder {
                    id: plugin_id.clone(),
                    token: purchased.clone(),
                    package: self.package_name.clone(),
                })
                .await
                .map_err(|e| purchase_failed(e.to_string()))?;
            token = Some(purchased);
        }

        Ok(token)
    }
}
