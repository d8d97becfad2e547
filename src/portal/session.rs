use std::sync::LazyLock;

use reqwest::{Client, Response};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::config::PortalConfig;
use crate::error::AppError;

pub const VIEWSTATE: &str = "__VIEWSTATE";
pub const VIEWSTATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";
pub const EVENT_TARGET: &str = "__EVENTTARGET";
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";

static VIEWSTATE_SEL: LazyLock<Selector> = LazyLock::new(|| hidden_input(VIEWSTATE));
static VIEWSTATE_GENERATOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| hidden_input(VIEWSTATE_GENERATOR));
static EVENT_VALIDATION_SEL: LazyLock<Selector> =
    LazyLock::new(|| hidden_input(EVENT_VALIDATION));

fn hidden_input(name: &str) -> Selector {
    Selector::parse(&format!(r#"input[name="{}"]"#, name)).expect("static selector")
}

/// Render-state tokens a WebForms page expects back on the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormTokens {
    pub view_state: Option<String>,
    pub view_state_generator: Option<String>,
    pub event_validation: Option<String>,
}

impl FormTokens {
    pub fn extract(html: &Html) -> Self {
        let value_of = |sel: &Selector| {
            html.select(sel)
                .next()
                .and_then(|input| input.value().attr("value"))
                .map(str::to_string)
        };

        Self {
            view_state: value_of(&VIEWSTATE_SEL),
            view_state_generator: value_of(&VIEWSTATE_GENERATOR_SEL),
            event_validation: value_of(&EVENT_VALIDATION_SEL),
        }
    }

    /// Overwrite with every token present in `fresh`; absent ones keep their prior value.
    pub fn refresh(&mut self, fresh: FormTokens) {
        if fresh.view_state.is_some() {
            self.view_state = fresh.view_state;
        }
        if fresh.view_state_generator.is_some() {
            self.view_state_generator = fresh.view_state_generator;
        }
        if fresh.event_validation.is_some() {
            self.event_validation = fresh.event_validation;
        }
    }

    /// Form body for a postback. Unset tokens are omitted; `extra` overrides by name.
    pub fn postback_form(
        &self,
        target: &str,
        argument: &str,
        extra: &[(&str, &str)],
    ) -> Vec<(String, String)> {
        let mut params = vec![
            (EVENT_TARGET.to_string(), target.to_string()),
            (EVENT_ARGUMENT.to_string(), argument.to_string()),
        ];
        let tokens = [
            (VIEWSTATE, &self.view_state),
            (VIEWSTATE_GENERATOR, &self.view_state_generator),
            (EVENT_VALIDATION, &self.event_validation),
        ];
        for (name, value) in tokens {
            if let Some(value) = value {
                params.push((name.to_string(), value.clone()));
            }
        }

        for &(key, val) in extra {
            if let Some(existing) = params.iter_mut().find(|(n, _)| n == key) {
                existing.1 = val.to_string();
            } else {
                params.push((key.to_string(), val.to_string()));
            }
        }

        params
    }
}

/// Raw markup of a loaded page. `Html` is not `Send`, so parse on demand between awaits.
#[derive(Debug, Clone)]
pub struct Page {
    body: String,
}

impl Page {
    pub fn new(body: String) -> Self {
        Self { body }
    }

    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// One cookie-backed conversation with the portal.
///
/// Tokens are only valid for the next request, so a session must be driven
/// serially and never shared between callers.
pub struct FormSession {
    http: Client,
    url: Option<String>,
    tokens: FormTokens,
}

impl FormSession {
    pub fn new(config: &PortalConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            url: None,
            tokens: FormTokens::default(),
        })
    }

    /// GET `url` and start a fresh token triad from it. The page must carry `__VIEWSTATE`.
    pub async fn load(&mut self, url: &str) -> Result<Page, AppError> {
        debug!("loading {}", url);
        let response = self.http.get(url).send().await?;
        let body = read_body(response).await?;

        let tokens = FormTokens::extract(&Html::parse_document(&body));
        if tokens.view_state.is_none() {
            warn!("no {} on initial page {}", VIEWSTATE, url);
            return Err(AppError::MalformedPage(format!(
                "{} missing from initial page",
                VIEWSTATE
            )));
        }

        self.tokens = tokens;
        self.url = Some(url.to_string());
        Ok(Page::new(body))
    }

    /// POST the current tokens back with `target`/`argument` and any field overrides.
    pub async fn postback(
        &mut self,
        target: &str,
        argument: &str,
        extra: &[(&str, &str)],
    ) -> Result<Page, AppError> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| AppError::MalformedPage("postback before initial load".to_string()))?;
        let params = self.tokens.postback_form(target, argument, extra);
        debug!("postback {} ({} fields)", target, params.len());

        let response = self.http.post(&url).form(&params).send().await?;
        let body = read_body(response).await?;

        let fresh = FormTokens::extract(&Html::parse_document(&body));
        if fresh.view_state.is_none() {
            debug!("postback {} returned no {}, keeping previous", target, VIEWSTATE);
        }
        self.tokens.refresh(fresh);
        Ok(Page::new(body))
    }
}

/// Body of a 2xx response; anything else is an `UpstreamStatus` failure.
async fn read_body(response: Response) -> Result<String, AppError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::UpstreamStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><form>
        <input type="hidden" name="__VIEWSTATE" value="vs-1" />
        <input type="hidden" name="__VIEWSTATEGENERATOR" value="gen-1" />
        <input type="hidden" name="__EVENTVALIDATION" value="ev-1" />
    </form></body></html>"#;

    #[test]
    fn test_extract_all_tokens() {
        let tokens = FormTokens::extract(&Html::parse_document(PAGE));
        assert_eq!(tokens.view_state.as_deref(), Some("vs-1"));
        assert_eq!(tokens.view_state_generator.as_deref(), Some("gen-1"));
        assert_eq!(tokens.event_validation.as_deref(), Some("ev-1"));
    }

    #[test]
    fn test_refresh_keeps_missing_tokens() {
        let mut tokens = FormTokens::extract(&Html::parse_document(PAGE));
        let partial = FormTokens::extract(&Html::parse_document(
            r#"<input type="hidden" name="__VIEWSTATE" value="vs-2" />"#,
        ));
        tokens.refresh(partial);

        assert_eq!(tokens.view_state.as_deref(), Some("vs-2"));
        assert_eq!(tokens.view_state_generator.as_deref(), Some("gen-1"));
        assert_eq!(tokens.event_validation.as_deref(), Some("ev-1"));
    }

    #[test]
    fn test_postback_form_overrides_and_omits_unset() {
        let tokens = FormTokens {
            view_state: Some("vs".to_string()),
            view_state_generator: None,
            event_validation: None,
        };
        let form =
            tokens.postback_form("ctl$List", "", &[("ctl$List", "3895"), (EVENT_ARGUMENT, "x")]);

        assert_eq!(
            form,
            vec![
                (EVENT_TARGET.to_string(), "ctl$List".to_string()),
                (EVENT_ARGUMENT.to_string(), "x".to_string()),
                (VIEWSTATE.to_string(), "vs".to_string()),
                ("ctl$List".to_string(), "3895".to_string()),
            ]
        );
    }

    #[test]
    fn test_page_without_tokens() {
        let tokens =
            FormTokens::extract(&Html::parse_document("<html><body>maintenance</body></html>"));
        assert_eq!(tokens, FormTokens::default());
    }
}
