//! Page inventory for working out selectors against an unfamiliar login page.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::Browser;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageInventory {
    pub url: String,
    /// `outerHTML` of every input, so real `name`/`id` attributes can be copied
    pub inputs: Vec<String>,
    /// Visible text of every button
    pub buttons: Vec<String>,
}

/// Navigate to `url`, let it settle and list its inputs and buttons.
pub async fn inspect_page(
    browser: &Browser,
    url: &str,
    settle: Duration,
) -> Result<PageInventory, AutomationError> {
    browser.goto(url).await?;
    if let Err(e) = browser.wait_for_load(settle).await {
        warn!(error = %e, "Page did not settle, inspecting anyway");
    }

    let engine_url = browser.current_url().await?;
    let mut inventory = PageInventory {
        url: engine_url,
        ..Default::default()
    };

    for input in browser.query(&Selector::Css("input, textarea".to_string())).await? {
        inventory.inputs.push(input.outer_html().await?);
    }
    for button in browser
        .query(&Selector::Css("button, input[type='submit']".to_string()))
        .await?
    {
        inventory.buttons.push(button.text().await?.trim().to_string());
    }

    if inventory.inputs.is_empty() {
        warn!(
            buttons = inventory.buttons.len(),
            "No inputs found; the login form may sit behind a button"
        );
    } else {
        info!(inputs = inventory.inputs.len(), "Found input fields");
    }
    Ok(inventory)
}
