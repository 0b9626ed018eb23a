//! HTTP client for the upstream storefront.
//!
//! Provides the substore binding handshake (browse, pincode lookup, store
//! preference, session info) and inventory fetching. All requests carry a
//! chained request token and the current cookie jar; responses rotate the
//! jar through their `Set-Cookie` headers.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue, REFERER, SET_COOKIE,
};
use shelfwatch_core::{Pincode, ProductAvailability, SessionCookies, SubstoreId};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::config::StorefrontConfig;

use super::token::TokenChain;
use super::wire::{PincodeLookupResponse, ProductListResponse, parse_session_info};
use super::{ResolveError, SessionError};

/// Per-request timeout for storefront calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts per inventory fetch before settling for an empty result.
const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Pause between inventory fetch attempts.
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Progress of the substore binding handshake.
///
/// The handshake advances one network call at a time, so a driver can
/// consult its caches between steps and skip the calls it already has
/// answers for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Nothing resolved yet; only the target pincode is known.
    Unresolved { pincode: Pincode },
    /// The pincode mapped to a substore name.
    NameResolved { substore_name: String },
    /// The storefront was asked to bind the session to the named substore.
    PreferenceSet { substore_name: String },
    /// The storefront confirmed the binding and reported the substore id.
    Bound {
        substore_id: SubstoreId,
        substore_name: String,
    },
}

impl Handshake {
    /// Start a handshake for a pincode.
    #[must_use]
    pub const fn begin(pincode: Pincode) -> Self {
        Self::Unresolved { pincode }
    }
}

/// Client holding one storefront session.
///
/// The cookie jar and the token chain mutate on every request, so they sit
/// behind a mutex and the client is shared by reference.
pub struct SessionClient {
    client: reqwest::Client,
    base: String,
    category: String,
    state: Mutex<SessionState>,
}

#[derive(Debug)]
struct SessionState {
    cookies: SessionCookies,
    tokens: TokenChain,
}

impl SessionClient {
    /// Create a client for the configured storefront.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the base URL
    /// cannot be carried in request headers.
    pub fn new(config: &StorefrontConfig) -> Result<Self, SessionError> {
        let base = config.endpoint_base();
        let browse = browse_url(&base, &config.category);

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        // The storefront routes API calls by these two custom headers.
        headers.insert("frontend", HeaderValue::from_static("1"));
        headers.insert(
            "base_url",
            HeaderValue::from_str(&browse)
                .map_err(|e| SessionError::Parse(format!("base_url header: {e}")))?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{base}/"))
                .map_err(|e| SessionError::Parse(format!("referer header: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base,
            category: config.category.clone(),
            state: Mutex::new(SessionState {
                cookies: SessionCookies::default(),
                tokens: TokenChain::new(config.store_id.as_str()),
            }),
        })
    }

    /// Advance the handshake by one step.
    ///
    /// `Bound` is terminal; advancing it returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns error when the step's network call fails or the pincode
    /// resolves to no substore.
    pub async fn advance(&self, state: Handshake) -> Result<Handshake, ResolveError> {
        match state {
            Handshake::Unresolved { pincode } => {
                self.prime_session().await?;
                let substore_name = self.resolve_substore_name(&pincode).await?;
                Ok(Handshake::NameResolved { substore_name })
            }
            Handshake::NameResolved { substore_name } => {
                self.set_store_preference(&substore_name).await?;
                Ok(Handshake::PreferenceSet { substore_name })
            }
            Handshake::PreferenceSet { substore_name } => {
                let substore_id = self.fetch_bound_substore_id().await?;
                Ok(Handshake::Bound {
                    substore_id,
                    substore_name,
                })
            }
            bound @ Handshake::Bound { .. } => Ok(bound),
        }
    }

    /// Warm the session by loading the browse page for the configured
    /// category. The storefront issues the initial cookies here.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip(self))]
    pub async fn prime_session(&self) -> Result<(), SessionError> {
        let url = browse_url(&self.base, &self.category);
        let response = self.send_get(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status {
                endpoint: "browse",
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Look up which substore serves a pincode.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::NotFound` when no substore serves the pincode.
    #[instrument(skip(self), fields(pincode = %pincode))]
    pub async fn resolve_substore_name(&self, pincode: &Pincode) -> Result<String, ResolveError> {
        let url = pincode_lookup_url(&self.base, pincode);
        let response = self.send_get(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status {
                endpoint: "pincode lookup",
                status: status.as_u16(),
            }
            .into());
        }

        let lookup: PincodeLookupResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Parse(format!("pincode lookup: {e}")))?;

        lookup
            .substore_name()
            .ok_or_else(|| ResolveError::NotFound(pincode.clone()))
    }

    /// Ask the storefront to bind the session to a substore by name.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is rejected.
    #[instrument(skip(self))]
    pub async fn set_store_preference(&self, substore_name: &str) -> Result<(), SessionError> {
        let url = set_preferences_url(&self.base);
        let (cookies, token) = self.session_headers().await;

        let body = serde_json::json!({ "data": { "store": substore_name } });

        let mut request = self.client.put(&url).header("tid", token).json(&body);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookies.as_str());
        }
        let response = request.send().await?;
        // Rotate cookies even on a rejected response; the status decides the
        // handshake outcome, not the jar.
        self.absorb_cookies(response.headers()).await;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status {
                endpoint: "set preferences",
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Read back which substore the session is bound to.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Unbound` when the session has no substore.
    #[instrument(skip(self))]
    pub async fn fetch_bound_substore_id(&self) -> Result<SubstoreId, SessionError> {
        let url = session_info_url(&self.base, Utc::now().timestamp_millis());
        let response = self.send_get(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status {
                endpoint: "session info",
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let info = parse_session_info(&body)?;
        info.substore_id().ok_or(SessionError::Unbound)
    }

    /// Fetch product availability for one substore.
    ///
    /// Polling never fails the cycle: transport errors, rejected statuses,
    /// and malformed bodies all come back as an empty list. The returned
    /// jar is the rotated one when the response set cookies, otherwise the
    /// jar that was passed in.
    pub async fn fetch_inventory(
        &self,
        substore_id: &SubstoreId,
        cookies: &SessionCookies,
    ) -> (Vec<ProductAvailability>, SessionCookies) {
        let url = inventory_url(&self.base, &self.category, substore_id);
        let token = self.state.lock().await.tokens.mint();

        let mut request = self.client.get(&url).header("tid", token);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookies.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(substore = %substore_id, error = %e, "inventory request failed");
                return (Vec::new(), cookies.clone());
            }
        };

        let rotated = cookie_pairs(response.headers()).unwrap_or_else(|| cookies.clone());

        let status = response.status();
        if !status.is_success() {
            warn!(
                substore = %substore_id,
                status = status.as_u16(),
                "inventory request rejected"
            );
            return (Vec::new(), rotated);
        }

        match response.json::<ProductListResponse>().await {
            Ok(list) => (list.availabilities(), rotated),
            Err(e) => {
                warn!(substore = %substore_id, error = %e, "inventory payload malformed");
                (Vec::new(), rotated)
            }
        }
    }

    /// Fetch inventory, retrying a bounded number of times while the result
    /// is empty.
    ///
    /// Cookies fold through the attempts: each retry rides on whatever the
    /// previous attempt rotated in, and the final jar comes back alongside
    /// the data so the caller can persist it either way.
    pub async fn fetch_inventory_with_retry(
        &self,
        substore_id: &SubstoreId,
        cookies: SessionCookies,
    ) -> (Vec<ProductAvailability>, SessionCookies) {
        let mut cookies = cookies;
        for attempt in 1..=MAX_FETCH_ATTEMPTS {
            let (availabilities, rotated) = self.fetch_inventory(substore_id, &cookies).await;
            cookies = rotated;
            if !availabilities.is_empty() {
                return (availabilities, cookies);
            }
            if attempt < MAX_FETCH_ATTEMPTS {
                debug!(substore = %substore_id, attempt, "empty inventory, retrying");
                tokio::time::sleep(FETCH_RETRY_DELAY).await;
            }
        }
        (Vec::new(), cookies)
    }

    /// Snapshot of the session's current cookie jar.
    pub async fn current_cookies(&self) -> SessionCookies {
        self.state.lock().await.cookies.clone()
    }

    /// Snapshot the cookie jar and mint the next request token.
    async fn session_headers(&self) -> (SessionCookies, String) {
        let mut state = self.state.lock().await;
        let token = state.tokens.mint();
        (state.cookies.clone(), token)
    }

    /// Merge rotated cookies into the session jar.
    ///
    /// A response without `Set-Cookie` headers leaves the jar untouched, so
    /// an established session survives endpoints that do not rotate cookies.
    async fn absorb_cookies(&self, headers: &HeaderMap) {
        if let Some(rotated) = cookie_pairs(headers) {
            self.state.lock().await.cookies = rotated;
        }
    }

    /// GET with session headers, absorbing rotated cookies before the caller
    /// inspects the status.
    async fn send_get(&self, url: &str) -> Result<reqwest::Response, SessionError> {
        let (cookies, token) = self.session_headers().await;

        let mut request = self.client.get(url).header("tid", token);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookies.as_str());
        }

        let response = request.send().await?;
        self.absorb_cookies(response.headers()).await;
        Ok(response)
    }
}

/// Collect rotated cookies from `Set-Cookie` headers.
///
/// Only the leading `name=value` of each header matters; attributes such as
/// `Path` and `HttpOnly` are dropped. Returns `None` when the response set
/// no cookies at all.
fn cookie_pairs(headers: &HeaderMap) -> Option<SessionCookies> {
    let pairs = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next());
    SessionCookies::from_pairs(pairs)
}

fn browse_url(base: &str, category: &str) -> String {
    format!("{base}/en/browse/{category}")
}

fn pincode_lookup_url(base: &str, pincode: &Pincode) -> String {
    format!(
        "{base}/entity/pincode?limit=50&filters[0][field]=pincode&filters[0][value]={}&filters[0][operator]=regex&cf_cache=1h",
        urlencoding::encode(pincode.as_str())
    )
}

fn set_preferences_url(base: &str) -> String {
    format!("{base}/entity/ms.settings/_/setPreferences")
}

fn session_info_url(base: &str, millis: i64) -> String {
    format!("{base}/user/info.js?_v={millis}")
}

/// Inventory list URL for one substore.
///
/// The query mirrors the storefront's own browse page; only `_id` and
/// `available` are read from the response.
fn inventory_url(base: &str, category: &str, substore_id: &SubstoreId) -> String {
    format!(
        "{base}/api/1/entity/ms.products\
         ?fields[name]=1&fields[brand]=1&fields[categories]=1&fields[collections]=1\
         &fields[alias]=1&fields[sku]=1&fields[price]=1&fields[compare_price]=1\
         &fields[original_price]=1&fields[images]=1&fields[metafields]=1\
         &fields[discounts]=1&fields[catalog_only]=1&fields[is_catalog]=1\
         &fields[seller]=1&fields[available]=1&fields[inventory_quantity]=1\
         &fields[net_quantity]=1&fields[num_reviews]=1&fields[avg_rating]=1\
         &fields[inventory_low_stock_quantity]=1&fields[inventory_allow_out_of_stock]=1\
         &fields[default_variant]=1&fields[variants]=1&fields[lp_seller_ids]=1\
         &filters[0][field]=categories&filters[0][value][0]={category}\
         &filters[0][operator]=in&filters[0][original]=1\
         &facets=true&facetgroup=default_category_facet\
         &limit=24&total=1&start=0&cdc=1m&substore={substore_id}"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_pairs_strips_attributes() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("jsessionid=abc123; Path=/; HttpOnly"),
        );
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("__cf=tok456; Secure"),
        );

        let jar = cookie_pairs(&headers).unwrap();
        assert_eq!(jar.as_str(), "jsessionid=abc123; __cf=tok456");
    }

    #[test]
    fn test_cookie_pairs_absent_is_none() {
        assert!(cookie_pairs(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_pincode_lookup_url_shape() {
        let pincode: Pincode = "110001".parse().unwrap();
        let url = pincode_lookup_url("https://shop.example.com", &pincode);
        assert!(url.starts_with("https://shop.example.com/entity/pincode?"));
        assert!(url.contains("filters[0][value]=110001"));
        assert!(url.contains("filters[0][operator]=regex"));
    }

    #[test]
    fn test_inventory_url_carries_category_and_substore() {
        let url = inventory_url(
            "https://shop.example.com",
            "protein",
            &SubstoreId::new("sub_42"),
        );
        assert!(url.contains("filters[0][value][0]=protein"));
        assert!(url.ends_with("substore=sub_42"));
        assert!(url.contains("fields[available]=1"));
    }

    #[test]
    fn test_session_info_url_cache_buster() {
        assert_eq!(
            session_info_url("https://shop.example.com", 1700000000000),
            "https://shop.example.com/user/info.js?_v=1700000000000"
        );
    }

    #[tokio::test]
    async fn test_advance_on_bound_is_identity() {
        let config = StorefrontConfig {
            base_url: "https://shop.example.com".parse().unwrap(),
            store_id: "store_1".to_owned(),
            category: "protein".to_owned(),
        };
        let client = SessionClient::new(&config).unwrap();

        let bound = Handshake::Bound {
            substore_id: SubstoreId::new("sub_42"),
            substore_name: "delhi".to_owned(),
        };
        let advanced = client.advance(bound.clone()).await.unwrap();
        assert_eq!(advanced, bound);
    }
}
