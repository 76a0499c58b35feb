use super::{BillingMode, CheckoutPrompt};
use crate::browser::{self, Listener};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use web_sys::{HtmlAnchorElement, HtmlButtonElement};

const LABEL: &str = "Subscribe";
const BUSY_LABEL: &str = "Loading...";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest<'a> {
    pub mode: BillingMode,
    pub price_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub url: String,
}

/// Asks the checkout endpoint for a payment session and returns its URL.
pub async fn create_session(endpoint: &str, prompt: &CheckoutPrompt) -> Result<String> {
    let request = CheckoutRequest {
        mode: prompt.mode,
        price_id: &prompt.price_id,
    };
    let session: CheckoutSession = browser::fetch_json_with(
        endpoint,
        "POST",
        &[("Content-Type", "application/json")],
        Some(&request),
    )
    .await?;
    Ok(session.url)
}

/// Button that starts checkout and redirects to the payment page.
pub struct CheckoutButton {
    pub element: HtmlButtonElement,
    _click: Listener,
}

impl CheckoutButton {
    pub fn new(endpoint: &str, prompt: CheckoutPrompt) -> Result<Self> {
        let element = browser::create_element::<HtmlButtonElement>("button")?;
        element.set_type("button");
        element.set_text_content(Some(LABEL));

        let button = element.clone();
        let endpoint = endpoint.to_string();
        let click = Listener::new(&element, "click", move |_| {
            if button.disabled() {
                return;
            }
            button.set_disabled(true);
            button.set_text_content(Some(BUSY_LABEL));

            let button = button.clone();
            let endpoint = endpoint.clone();
            let prompt = prompt.clone();
            browser::spawn_local(async move {
                let result = match create_session(&endpoint, &prompt).await {
                    Ok(url) => browser::redirect(&url),
                    Err(err) => Err(err),
                };
                if let Err(err) = result {
                    log::error!("checkout failed: {err:#}");
                    button.set_disabled(false);
                    button.set_text_content(Some(LABEL));
                }
            });
        })?;

        Ok(Self {
            element,
            _click: click,
        })
    }
}

/// Link to the account page, labelled with the signed-in email.
pub fn account_button(account_url: &str, email: Option<&str>) -> Result<HtmlAnchorElement> {
    let link = browser::create_element::<HtmlAnchorElement>("a")?;
    link.set_href(account_url);
    link.set_class_name("account-button");
    link.set_text_content(Some(email.unwrap_or("Account")));
    Ok(link)
}
