use serde::{Deserialize, Serialize};

// ==================== Embed ====================

/// Where a Unity WebGL build lives and how its canvas should be laid out.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedConfig {
    pub build_path: String,
    pub file_name: String,
    pub product_name: String,
    pub company_name: String,
    pub product_version: String,
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
    pub responsive: bool,
    pub maintain_aspect_ratio: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            build_path: "/Build".into(),
            file_name: "UnityBuild".into(),
            product_name: "Unity Game".into(),
            company_name: "DefaultCompany".into(),
            product_version: "1.0".into(),
            title: None,
            width: 960,
            height: 600,
            responsive: true,
            maintain_aspect_ratio: true,
        }
    }
}

impl EmbedConfig {
    pub fn assets(&self) -> BuildAssets {
        BuildAssets::new(&self.build_path, &self.file_name)
    }
}

/// The file layout a Unity WebGL build expects next to the page.
///
/// For build path `P` and file name `F`: `P/F.loader.js`, `P/F.data`,
/// `P/F.framework.js`, `P/F.wasm` and a `StreamingAssets` directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAssets {
    #[serde(skip)]
    pub loader_url: String,
    pub data_url: String,
    pub framework_url: String,
    pub code_url: String,
    pub streaming_assets_url: String,
}

impl BuildAssets {
    const STREAMING_ASSETS: &'static str = "StreamingAssets";

    pub fn new(build_path: &str, file_name: &str) -> Self {
        let base = build_path.trim_end_matches('/');
        Self {
            loader_url: format!("{base}/{file_name}.loader.js"),
            data_url: format!("{base}/{file_name}.data"),
            framework_url: format!("{base}/{file_name}.framework.js"),
            code_url: format!("{base}/{file_name}.wasm"),
            streaming_assets_url: Self::STREAMING_ASSETS.into(),
        }
    }
}

/// The configuration object handed to `createUnityInstance`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    #[serde(flatten)]
    pub assets: BuildAssets,
    pub company_name: String,
    pub product_name: String,
    pub product_version: String,
}

impl From<&EmbedConfig> for RuntimeConfig {
    fn from(config: &EmbedConfig) -> Self {
        Self {
            assets: config.assets(),
            company_name: config.company_name.clone(),
            product_name: config.product_name.clone(),
            product_version: config.product_version.clone(),
        }
    }
}

// ==================== Page ====================

/// Static configuration of the gated page, fetched as JSON at startup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageConfig {
    /// Id of the element the page renders into.
    pub root_id: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// `localStorage` key holding the session JSON with an `access_token`.
    pub session_storage_key: String,
    pub entitlement_table: String,
    pub checkout_endpoint: String,
    pub subscription_price_id: String,
    pub account_url: String,
    pub embed: EmbedConfig,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            root_id: "app".into(),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            session_storage_key: "sb-auth-token".into(),
            entitlement_table: "user_access".into(),
            checkout_endpoint: "/api/checkout".into(),
            subscription_price_id: String::new(),
            account_url: "/account".into(),
            embed: EmbedConfig {
                title: Some("Play".into()),
                ..EmbedConfig::default()
            },
        }
    }
}
