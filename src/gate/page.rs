use super::checkout::{account_button, CheckoutButton};
use super::supabase::SupabaseClient;
use super::{resolve, PageView, User};
use crate::browser;
use crate::config::PageConfig;
use crate::embed::{Callbacks, EmbedHandle};
use anyhow::{anyhow, Result};
use web_sys::{HtmlDivElement, HtmlElement};

const SUBSCRIBE_HEADING: &str = "Subscription required";
const SUBSCRIBE_TEXT: &str =
    "Playing requires an active subscription. Subscribe to unlock full access to the game.";
const SIGN_IN_TEXT: &str = "Please sign in to continue.";

/// What is currently on screen; keeps the embed and its listeners alive.
pub struct GatedPage {
    _embed: Option<EmbedHandle>,
    _checkout: Option<CheckoutButton>,
}

impl GatedPage {
    pub fn render(root: &HtmlElement, config: &PageConfig, view: PageView) -> Result<Self> {
        root.set_inner_html("");

        match view {
            PageView::SignIn => {
                append(root, &text_block("gate__sign-in", SIGN_IN_TEXT)?)?;
                Ok(Self {
                    _embed: None,
                    _checkout: None,
                })
            }
            PageView::Embed { user, config: embed_config } => {
                let bar = account_bar(config, &user)?;
                append(root, &bar)?;
                let container = browser::create_element::<HtmlDivElement>("div")?;
                container.set_class_name("gate__embed");
                append(root, &container)?;
                let embed = EmbedHandle::mount(&container, embed_config, Callbacks::default())?;
                Ok(Self {
                    _embed: Some(embed),
                    _checkout: None,
                })
            }
            PageView::Checkout { user, prompt } => {
                let bar = account_bar(config, &user)?;
                append(root, &bar)?;
                let card = browser::create_element::<HtmlDivElement>("div")?;
                card.set_class_name("gate__checkout");
                let heading = browser::create_element::<HtmlElement>("h2")?;
                heading.set_text_content(Some(SUBSCRIBE_HEADING));
                append(&card, &heading)?;
                append(&card, &text_block("gate__checkout-text", SUBSCRIBE_TEXT)?)?;
                let button = CheckoutButton::new(&config.checkout_endpoint, prompt)?;
                append(&card, &button.element)?;
                append(root, &card)?;
                Ok(Self {
                    _embed: None,
                    _checkout: Some(button),
                })
            }
        }
    }
}

/// Resolves the visitor against Supabase and renders the result into the
/// configured root element.
pub async fn load(config: &PageConfig) -> Result<GatedPage> {
    let client = SupabaseClient::new(config);
    let view = resolve(config, &client, &client).await;
    let root = browser::get_element_by_id(&config.root_id)?;
    GatedPage::render(&root, config, view)
}

fn account_bar(config: &PageConfig, user: &User) -> Result<HtmlDivElement> {
    let bar = browser::create_element::<HtmlDivElement>("div")?;
    bar.set_class_name("gate__account");
    bar.set_attribute("style", "display:flex;justify-content:flex-end;padding:8px;")
        .map_err(|err| anyhow!("{}", browser::js_error_message(&err)))?;
    let link = account_button(&config.account_url, user.email.as_deref())?;
    append(&bar, &link)?;
    Ok(bar)
}

fn text_block(class: &str, text: &str) -> Result<HtmlElement> {
    let element = browser::create_element::<HtmlElement>("p")?;
    element.set_class_name(class);
    element.set_text_content(Some(text));
    Ok(element)
}

fn append(parent: &HtmlElement, child: &HtmlElement) -> Result<()> {
    parent
        .append_child(child)
        .map(|_| ())
        .map_err(|err| {
            anyhow!("Could not append element : {}", browser::js_error_message(&err))
        })
}
