//! REST store backed by a PostgREST-style managed database.
//!
//! Provides both async and blocking store variants behind feature flags.
//! Each speaks to two tables: `categories` (read, upsert, delete) and
//! `products` (counted per category name).

use std::time::Duration;

/// Path prefix of the REST interface under the project URL.
const REST_PREFIX: &str = "rest/v1/";

/// Category table name.
const CATEGORIES_TABLE: &str = "categories";

/// Product table name.
const PRODUCTS_TABLE: &str = "products";

/// Columns selected when reading categories.
const CATEGORY_COLUMNS: &str = "id,name,parent_id,order";

/// Header carrying the project API key.
const API_KEY_HEADER: &str = "apikey";

/// PostgREST preference header.
const PREFER_HEADER: &str = "prefer";

/// Preference for insert-or-update returning the written row.
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=representation";

/// Preference asking for an exact row count in `Content-Range`.
const COUNT_PREFERENCE: &str = "count=exact";

/// Request timeout used when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extracts the total from a `Content-Range` value such as `0-4/5` or `*/0`.
fn content_range_total(value: &str) -> Option<u32> {
    value
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
}

/// Builds the `in.(...)` filter for a delete by id.
fn id_filter(ids: &[crate::models::PersistentId]) -> String {
    let joined: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("in.({})", joined.join(","))
}

/// Generates a REST store (async or blocking) with builder, requests, and tests.
macro_rules! define_rest_store {
    (
        store_name: $store:ident,
        builder_name: $builder:ident,
        http_type: $http_type:ty,
        request_type: $req_type:ty,
        response_type: $resp_type:ty,
        store_doc: $store_doc:expr,
        builder_doc: $builder_doc:expr,
        $(async_kw: $async_kw:tt,)?
        $(await_kw: $await_ext:tt,)?
    ) => {
        #[doc = $builder_doc]
        #[derive(Debug)]
        pub struct $builder {
            /// Project URL the REST prefix is appended to.
            base_url: Option<String>,
            /// Project API key.
            api_key: Option<SecretString>,
            /// Per-request timeout.
            timeout: Option<Duration>,
        }

        impl $builder {
            /// Sets the project URL, e.g. `https://example.supabase.co`.
            #[inline]
            #[must_use]
            pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
                self.base_url = Some(url.into());
                self
            }

            /// Sets the API key sent with every request.
            #[inline]
            #[must_use]
            pub fn api_key<T: Into<String>>(mut self, key: T) -> Self {
                self.api_key = Some(SecretString::from(key.into()));
                self
            }

            /// Overrides the per-request timeout (30 seconds by default).
            #[inline]
            #[must_use]
            pub const fn timeout(mut self, timeout: Duration) -> Self {
                self.timeout = Some(timeout);
                self
            }

            /// Builds the store.
            ///
            /// # Errors
            ///
            /// Returns [`CatalogError::Validation`] if the URL or key is
            /// missing or the URL does not parse.
            /// Returns [`CatalogError::Http`] if the HTTP client fails to build.
            #[inline]
            #[tracing::instrument(skip_all)]
            pub fn build(self) -> Result<$store> {
                let mut raw_url = self.base_url.ok_or_else(|| {
                    CatalogError::Validation("remote store URL is required".to_owned())
                })?;
                let api_key = self.api_key.ok_or_else(|| {
                    CatalogError::Validation("remote store API key is required".to_owned())
                })?;
                if !raw_url.ends_with('/') {
                    raw_url.push('/');
                }
                let base_url = Url::parse(&raw_url).map_err(|err| {
                    CatalogError::Validation(format!("invalid remote store URL {raw_url:?}: {err}"))
                })?;
                tracing::debug!(base_url = %base_url, "building REST store");
                let http = <$http_type>::builder()
                    .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
                    .build()?;

                Ok($store {
                    http,
                    base_url,
                    api_key,
                })
            }
        }

        #[doc = $store_doc]
        #[derive(Debug)]
        pub struct $store {
            /// Underlying HTTP client.
            http: $http_type,
            /// Project URL, always ending in `/`.
            base_url: Url,
            /// Project API key.
            api_key: SecretString,
        }

        impl $store {
            /// Creates a new builder for configuring the store.
            #[inline]
            #[must_use]
            pub const fn builder() -> $builder {
                $builder {
                    base_url: None,
                    api_key: None,
                    timeout: None,
                }
            }

            /// Starts an authenticated request against a table.
            fn request(
                &self,
                method: Method,
                table: &str,
                query: &[(&str, &str)],
            ) -> Result<$req_type> {
                let mut url = self
                    .base_url
                    .join(&format!("{REST_PREFIX}{table}"))
                    .map_err(|err| CatalogError::Validation(format!("invalid table path: {err}")))?;
                if !query.is_empty() {
                    let mut pairs = url.query_pairs_mut();
                    let _pairs = pairs.extend_pairs(query);
                }
                tracing::trace!(method = %method, url = %url, "sending request");
                let key = self.api_key.expose_secret();
                Ok(self
                    .http
                    .request(method, url)
                    .header(API_KEY_HEADER, key)
                    .header(AUTHORIZATION, format!("Bearer {key}")))
            }

            /// Sends a request and turns non-success statuses into
            /// [`CatalogError::Api`].
            $($async_kw)? fn execute(&self, request: $req_type) -> Result<$resp_type> {
                let response: $resp_type = request.send() $( .$await_ext )? ?;
                let status = response.status();
                tracing::debug!(status = %status, "received response");
                if status.is_success() {
                    return Ok(response);
                }
                let message = response
                    .text()
                    $( .$await_ext )?
                    .unwrap_or_else(|_| "unknown error".to_owned());
                tracing::debug!(status = status.as_u16(), message = %message, "API error");
                Err(CatalogError::Api {
                    status: status.as_u16(),
                    message,
                })
            }

            /// Reads every category row.
            #[tracing::instrument(skip_all)]
            $($async_kw)? fn select_rows(&self) -> Result<Vec<StoredCategory>> {
                let request = self
                    .request(
                        Method::GET,
                        CATEGORIES_TABLE,
                        &[("select", CATEGORY_COLUMNS), ("order", "order.asc")],
                    )?;
                let body = self.execute(request) $( .$await_ext )? ?
                    .text() $( .$await_ext )? ?;
                tracing::trace!(body_len = body.len(), "parsing category rows");
                let mut rows: Vec<StoredCategory> = serde_json::from_str(&body)?;
                sort_rows(&mut rows);
                Ok(rows)
            }

            /// Inserts or updates one category row.
            #[tracing::instrument(skip_all, fields(name = %row.name))]
            $($async_kw)? fn write_row(&self, row: CategoryRow) -> Result<StoredCategory> {
                let request = self
                    .request(Method::POST, CATEGORIES_TABLE, &[])?
                    .header(PREFER_HEADER, UPSERT_PREFERENCE)
                    .json(&row);
                let body = self.execute(request) $( .$await_ext )? ?
                    .text() $( .$await_ext )? ?;
                let written: Vec<StoredCategory> = serde_json::from_str(&body)?;
                written.into_iter().next().ok_or_else(|| {
                    CatalogError::Storage("upsert returned no row".into())
                })
            }

            /// Deletes category rows by id.
            #[tracing::instrument(skip_all, fields(count = ids.len()))]
            $($async_kw)? fn delete_rows(&self, ids: &[PersistentId]) -> Result<()> {
                if ids.is_empty() {
                    return Ok(());
                }
                let filter = id_filter(ids);
                let request =
                    self.request(Method::DELETE, CATEGORIES_TABLE, &[("id", filter.as_str())])?;
                let _response = self.execute(request) $( .$await_ext )? ?;
                Ok(())
            }

            /// Counts the products assigned to a category name.
            #[tracing::instrument(skip_all, fields(category = %category_name))]
            $($async_kw)? fn count_products(&self, category_name: &str) -> Result<u32> {
                let filter = format!("eq.{category_name}");
                let request = self
                    .request(
                        Method::GET,
                        PRODUCTS_TABLE,
                        &[("select", "id"), ("category", filter.as_str())],
                    )?
                    .header(PREFER_HEADER, COUNT_PREFERENCE);
                let response = self.execute(request) $( .$await_ext )? ?;
                let total = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(content_range_total);
                if let Some(count) = total {
                    return Ok(count);
                }
                let body = response.text() $( .$await_ext )? ?;
                let products: Vec<serde_json::Value> = serde_json::from_str(&body)?;
                u32::try_from(products.len()).map_err(|err| CatalogError::Storage(Box::new(err)))
            }
        }

    };
}

#[cfg(feature = "async")]
mod async_rest {
    //! Async REST store.

    use core::future::Future;
    use std::time::Duration;

    use reqwest::Method;
    use reqwest::header::{AUTHORIZATION, CONTENT_RANGE};
    use secrecy::{ExposeSecret as _, SecretString};
    use url::Url;

    use super::{
        API_KEY_HEADER, CATEGORIES_TABLE, CATEGORY_COLUMNS, COUNT_PREFERENCE, DEFAULT_TIMEOUT,
        PREFER_HEADER, PRODUCTS_TABLE, REST_PREFIX, UPSERT_PREFERENCE, content_range_total,
        id_filter,
    };
    use crate::error::{CatalogError, Result};
    use crate::models::{CategoryRow, PersistentId, StoredCategory};
    use crate::store::{CategoryStore, sort_rows};

    define_rest_store! {
        store_name: RestStore,
        builder_name: RestStoreBuilder,
        http_type: reqwest::Client,
        request_type: reqwest::RequestBuilder,
        response_type: reqwest::Response,
        store_doc: "Async store speaking to a PostgREST-style managed database.\n\nUse [`RestStore::builder()`] to construct an instance.",
        builder_doc: "Builder for constructing a [`RestStore`].",
        async_kw: async,
        await_kw: await,
    }

    impl CategoryStore for RestStore {
        #[inline]
        fn fetch_all(&self) -> impl Future<Output = Result<Vec<StoredCategory>>> + Send {
            self.select_rows()
        }

        #[inline]
        fn upsert(&self, row: CategoryRow) -> impl Future<Output = Result<StoredCategory>> + Send {
            self.write_row(row)
        }

        #[inline]
        fn delete_by_ids(&self, ids: &[PersistentId]) -> impl Future<Output = Result<()>> + Send {
            self.delete_rows(ids)
        }

        #[inline]
        fn product_count(&self, category_name: &str) -> impl Future<Output = Result<u32>> + Send {
            self.count_products(category_name)
        }
    }
}

#[cfg(feature = "blocking")]
mod blocking_rest {
    //! Blocking REST store.

    use std::time::Duration;

    use reqwest::Method;
    use reqwest::header::{AUTHORIZATION, CONTENT_RANGE};
    use secrecy::{ExposeSecret as _, SecretString};
    use url::Url;

    use super::{
        API_KEY_HEADER, CATEGORIES_TABLE, CATEGORY_COLUMNS, COUNT_PREFERENCE, DEFAULT_TIMEOUT,
        PREFER_HEADER, PRODUCTS_TABLE, REST_PREFIX, UPSERT_PREFERENCE, content_range_total,
        id_filter,
    };
    use crate::error::{CatalogError, Result};
    use crate::models::{CategoryRow, PersistentId, StoredCategory};
    use crate::store::{BlockingCategoryStore, sort_rows};

    define_rest_store! {
        store_name: RestBlockingStore,
        builder_name: RestBlockingStoreBuilder,
        http_type: reqwest::blocking::Client,
        request_type: reqwest::blocking::RequestBuilder,
        response_type: reqwest::blocking::Response,
        store_doc: "Blocking store speaking to a PostgREST-style managed database.\n\nUse [`RestBlockingStore::builder()`] to construct an instance.",
        builder_doc: "Builder for constructing a [`RestBlockingStore`].",
    }

    impl BlockingCategoryStore for RestBlockingStore {
        #[inline]
        fn fetch_all(&self) -> Result<Vec<StoredCategory>> {
            self.select_rows()
        }

        #[inline]
        fn upsert(&self, row: CategoryRow) -> Result<StoredCategory> {
            self.write_row(row)
        }

        #[inline]
        fn delete_by_ids(&self, ids: &[PersistentId]) -> Result<()> {
            self.delete_rows(ids)
        }

        #[inline]
        fn product_count(&self, category_name: &str) -> Result<u32> {
            self.count_products(category_name)
        }
    }
}

#[cfg(feature = "async")]
pub use async_rest::{RestStore, RestStoreBuilder};
#[cfg(feature = "blocking")]
pub use blocking_rest::{RestBlockingStore, RestBlockingStoreBuilder};
