//! # Wiki Client
//!
//! [`WikiClient`] maps wiki operations onto remote procedures:
//!
//! | Method | Remote call |
//! |---|---|
//! | [`get_page`](WikiClient::get_page) | `getPage` / `getPageVersion` |
//! | [`get_page_history`](WikiClient::get_page_history) | `getRecentChanges`, filtered to one page |
//! | [`get_all_pages`](WikiClient::get_all_pages) | `getAllPages` |
//! | [`search_pages`](WikiClient::search_pages) | `searchPages` |
//! | [`get_recent_changes`](WikiClient::get_recent_changes) | `getRecentChanges` |
//! | [`get_auth_token`](WikiClient::get_auth_token) | `getAuthToken` |
//! | [`put_page`](WikiClient::put_page) | `system.multicall[applyAuthToken, putPage]` |
//!
//! Writes authenticate and write in a single multicall round trip, so the
//! token is applied in the same request that uses it.
//!
//! History is best effort: wikis that do not support the richer recent
//! changes records yield an empty list rather than an error. An empty history
//! therefore does not prove the page has never changed.

use crate::config::ConfigStore;
use crate::error::{MoinError, Result};
use crate::rpc::http::HttpTransport;
use crate::rpc::{MethodCall, Transport, Value};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tracing::{debug, warn};

/// How far back history lookups search.
pub const HISTORY_LOOKBACK_DAYS: u32 = 3650;
pub const DEFAULT_RECENT_DAYS: u32 = 7;

/// One revision of a page as reported by the wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub version: i64,
    pub last_modified: Option<NaiveDateTime>,
    pub author: String,
    pub comment: String,
}

/// One entry of a recent-changes or search result. Wikis disagree on the
/// shape, so all three are accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEntry {
    /// `[name, timestamp]` (or `[name, context]` for search hits)
    Pair { name: String, detail: Value },
    /// A struct with at least a `name` member.
    Record {
        name: String,
        last_modified: Option<NaiveDateTime>,
        author: Option<String>,
        version: Option<i64>,
        comment: Option<String>,
    },
    Bare(String),
}

impl ChangeEntry {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Some(ChangeEntry::Bare(name.clone())),
            Value::Array(items) => {
                let name = items.first()?.as_str()?.to_string();
                let detail = items.get(1).cloned().unwrap_or(Value::Nil);
                Some(ChangeEntry::Pair { name, detail })
            }
            Value::Struct(_) => {
                let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
                Some(ChangeEntry::Record {
                    name: text("name")?,
                    last_modified: value.get("lastModified").and_then(timestamp_of),
                    author: text("author"),
                    version: value.get("version").and_then(Value::as_i64),
                    comment: text("comment"),
                })
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ChangeEntry::Pair { name, .. } | ChangeEntry::Record { name, .. } => name,
            ChangeEntry::Bare(name) => name,
        }
    }
}

fn timestamp_of(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::String(s) => crate::model::parse_timestamp_str(s).map(|dt| dt.naive_utc()),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
        _ => None,
    }
}

/// Flatten a list of change entries to page names, skipping anything
/// unrecognizable.
pub fn page_names(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| {
            let parsed = ChangeEntry::from_value(entry);
            if parsed.is_none() {
                debug!(kind = entry.type_name(), "skipping unrecognized change entry");
            }
            parsed
        })
        .map(|entry| entry.name().to_string())
        .collect()
}

fn cutoff(days: u32) -> NaiveDateTime {
    let now = Utc::now();
    now.checked_sub_signed(TimeDelta::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .naive_utc()
}

pub struct WikiClient<T: Transport = HttpTransport> {
    transport: T,
    store: Option<ConfigStore>,
    alias: Option<String>,
}

impl WikiClient<HttpTransport> {
    /// Client for a bare XML-RPC endpoint. Nothing is sent until the first call.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(endpoint)?))
    }

    /// Client for a configured server. `alias` defaults to the configured
    /// default server.
    pub fn from_config(store: &ConfigStore, alias: Option<&str>) -> Result<Self> {
        let server = store.get_wiki_config(alias)?;
        let transport = HttpTransport::for_server(&server)?;
        debug!(endpoint = transport.endpoint(), "client ready");
        Ok(Self::with_transport(transport).with_store(store.clone(), alias))
    }
}

impl<T: Transport> WikiClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            store: None,
            alias: None,
        }
    }

    /// Attach the store (and optional alias) used to look up credentials.
    pub fn with_store(mut self, store: ConfigStore, alias: Option<&str>) -> Self {
        self.store = Some(store);
        self.alias = alias.map(str::to_string);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get_page(&self, name: &str, revision: Option<u32>) -> Result<String> {
        let (method, value) = match revision {
            Some(rev) => (
                "getPageVersion",
                self.transport
                    .call("getPageVersion", &[name.into(), rev.into()])?,
            ),
            None => ("getPage", self.transport.call("getPage", &[name.into()])?),
        };
        value.into_string().ok_or_else(|| unexpected(method, "string"))
    }

    /// Revisions of `name`, newest first. Empty when the wiki cannot answer.
    pub fn get_page_history(&self, name: &str) -> Vec<Revision> {
        match self.fetch_page_history(name) {
            Ok(revisions) => revisions,
            Err(err) => {
                warn!(page = name, error = %err, "page history unavailable");
                Vec::new()
            }
        }
    }

    fn fetch_page_history(&self, name: &str) -> Result<Vec<Revision>> {
        let since = cutoff(HISTORY_LOOKBACK_DAYS);
        let entries = self
            .transport
            .call("getRecentChanges", &[since.into()])?
            .into_array()
            .ok_or_else(|| unexpected("getRecentChanges", "array"))?;

        let mut revisions: Vec<Revision> = entries
            .iter()
            .filter_map(ChangeEntry::from_value)
            .filter_map(|entry| match entry {
                ChangeEntry::Record {
                    name: page,
                    last_modified,
                    author,
                    version,
                    comment,
                } if page == name => Some(Revision {
                    version: version.unwrap_or_default(),
                    last_modified,
                    author: author.unwrap_or_default(),
                    comment: comment.unwrap_or_default(),
                }),
                _ => None,
            })
            .collect();
        revisions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(revisions)
    }

    pub fn get_all_pages(&self) -> Result<Vec<String>> {
        let pages = self
            .transport
            .call("getAllPages", &[])?
            .into_array()
            .ok_or_else(|| unexpected("getAllPages", "array"))?;
        pages
            .into_iter()
            .map(|page| page.into_string().ok_or_else(|| unexpected("getAllPages", "array of strings")))
            .collect()
    }

    pub fn search_pages(&self, query: &str) -> Result<Vec<String>> {
        let hits = self
            .transport
            .call("searchPages", &[query.into()])?
            .into_array()
            .ok_or_else(|| unexpected("searchPages", "array"))?;
        Ok(page_names(&hits))
    }

    /// Names of pages changed in the last `days` days.
    pub fn get_recent_changes(&self, days: u32) -> Result<Vec<String>> {
        let since = cutoff(days);
        debug!(days, since = %since, "fetching recent changes");
        let entries = self
            .transport
            .call("getRecentChanges", &[since.into()])?
            .into_array()
            .ok_or_else(|| unexpected("getRecentChanges", "array"))?;
        Ok(page_names(&entries))
    }

    /// Exchange a username and password for an access token.
    pub fn get_auth_token(&self, username: &str, password: &str) -> Result<String> {
        let value = self
            .transport
            .call("getAuthToken", &[username.into(), password.into()])?;
        let token = match value {
            Value::String(token) => token,
            Value::Struct(_) => value
                .get("token")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| unexpected("getAuthToken", "string or struct with token"))?,
            _ => return Err(unexpected("getAuthToken", "string or struct with token")),
        };
        if token.trim().is_empty() {
            return Err(MoinError::EmptyToken);
        }
        Ok(token)
    }

    /// Write `content` to `name`. Without an explicit `token`, the stored
    /// token for `alias` (then this client's alias, then the default server)
    /// is used; no request is made if there is none.
    pub fn put_page(
        &self,
        name: &str,
        content: &str,
        token: Option<&str>,
        alias: Option<&str>,
    ) -> Result<bool> {
        let token = match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => token.to_string(),
            None => self.stored_token(alias)?,
        };

        debug!(page = name, bytes = content.len(), "writing page");
        let results = self.transport.multicall(&[
            MethodCall::new("applyAuthToken", vec![token.into()]),
            MethodCall::new("putPage", vec![name.into(), content.into()]),
        ])?;

        let mut results = results.into_iter();
        match (results.next(), results.next()) {
            (Some(auth), Some(write)) => {
                auth?;
                write?
                    .as_bool()
                    .ok_or_else(|| unexpected("putPage", "boolean"))
            }
            _ => Err(unexpected("system.multicall", "two results")),
        }
    }

    fn stored_token(&self, alias: Option<&str>) -> Result<String> {
        let alias = alias.or(self.alias.as_deref());
        let Some(store) = &self.store else {
            return Err(MoinError::MissingCredential {
                alias: alias.unwrap_or("default").to_string(),
            });
        };

        let server = store.get_wiki_config(alias)?;
        let label = alias
            .map(str::to_string)
            .or_else(|| server.name.clone())
            .unwrap_or_default();
        if !server.has_token() {
            return Err(MoinError::MissingCredential { alias: label });
        }
        if server.token_expired_at(Utc::now()) {
            warn!(server = %label, "stored access token has expired; run `moin auth` to renew it");
        }
        Ok(server.access_token)
    }
}

fn unexpected(method: &str, expected: &'static str) -> MoinError {
    MoinError::UnexpectedResponse {
        method: method.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{Config, ServerConfig};
    use crate::rpc::memory::ScriptedTransport;
    use crate::rpc::value::structure;
    use crate::rpc::{multicall_response, Fault};
    use tempfile::TempDir;

    fn client(transport: ScriptedTransport) -> WikiClient<ScriptedTransport> {
        WikiClient::with_transport(transport)
    }

    fn store_with_token(token: &str) -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        let mut config = Config::new("test");
        config.upsert_server(
            "test",
            ServerConfig::new("http://localhost:8080/", "testuser", token).unwrap(),
        );
        config.upsert_server(
            "other",
            ServerConfig::new("http://other:8080/", "o", "other-token").unwrap(),
        );
        store.save_config(&config).unwrap();
        (dir, store)
    }

    fn put_ok() -> Value {
        multicall_response(&[Ok(Value::from("SUCCESS")), Ok(Value::Bool(true))])
    }

    fn record(name: &str, version: i64, author: &str, comment: &str) -> Value {
        structure([
            ("name", Value::from(name)),
            ("version", Value::from(version)),
            ("author", Value::from(author)),
            ("comment", Value::from(comment)),
            ("lastModified", Value::from("2023-01-01T00:00:00")),
        ])
    }

    #[test]
    fn test_get_page_current() {
        let wiki = client(ScriptedTransport::new().respond("Test page content"));
        assert_eq!(wiki.get_page("FrontPage", None).unwrap(), "Test page content");

        let call = wiki.transport().last_call().unwrap();
        assert_eq!(call.method, "getPage");
        assert_eq!(call.params, vec![Value::from("FrontPage")]);
    }

    #[test]
    fn test_get_page_revision() {
        let wiki = client(ScriptedTransport::new().respond("v5"));
        assert_eq!(wiki.get_page("FrontPage", Some(5)).unwrap(), "v5");

        let call = wiki.transport().last_call().unwrap();
        assert_eq!(call.method, "getPageVersion");
        assert_eq!(call.params, vec![Value::from("FrontPage"), Value::Int(5)]);
    }

    #[test]
    fn test_get_page_fault_propagates() {
        let wiki = client(ScriptedTransport::new().fault(1, "No such page was found."));
        let err = wiki.get_page("Missing", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn test_get_all_pages() {
        let wiki = client(ScriptedTransport::new().respond(vec![
            Value::from("FrontPage"),
            Value::from("HelpContents"),
        ]));
        assert_eq!(wiki.get_all_pages().unwrap(), vec!["FrontPage", "HelpContents"]);
    }

    #[test]
    fn test_get_all_pages_empty() {
        let wiki = client(ScriptedTransport::new().respond(Vec::<Value>::new()));
        assert!(wiki.get_all_pages().unwrap().is_empty());
    }

    #[test]
    fn test_search_pages_normalizes_entries() {
        let wiki = client(ScriptedTransport::new().respond(vec![
            Value::from("HomePage"),
            Value::Array(vec![Value::from("HelpPage"), Value::from("...help...")]),
            structure([("name", Value::from("WikiHelp"))]),
        ]));
        assert_eq!(
            wiki.search_pages("help").unwrap(),
            vec!["HomePage", "HelpPage", "WikiHelp"]
        );
        assert_eq!(
            wiki.transport().last_call().unwrap().params,
            vec![Value::from("help")]
        );
    }

    #[test]
    fn test_search_empty_query_is_sent() {
        let wiki = client(ScriptedTransport::new().respond(Vec::<Value>::new()));
        assert!(wiki.search_pages("").unwrap().is_empty());
        assert_eq!(wiki.transport().call_count(), 1);
    }

    #[test]
    fn test_recent_changes_pairs() {
        let pair = |name: &str, ts: i64| Value::Array(vec![Value::from(name), Value::from(ts)]);
        let wiki = client(ScriptedTransport::new().respond(vec![
            pair("HomePage", 1234567890),
            pair("WikiPage", 1234567800),
            pair("SandBox", 1234567700),
        ]));
        assert_eq!(
            wiki.get_recent_changes(7).unwrap(),
            vec!["HomePage", "WikiPage", "SandBox"]
        );
    }

    #[test]
    fn test_recent_changes_mixed_shapes() {
        let wiki = client(ScriptedTransport::new().respond(vec![
            record("A", 1, "x", ""),
            Value::from("B"),
            Value::Array(vec![Value::from("C"), Value::Int(0)]),
            Value::Int(99),
        ]));
        assert_eq!(wiki.get_recent_changes(7).unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_recent_changes_cutoff_moves_with_days() {
        let wiki = client(
            ScriptedTransport::new()
                .respond(Vec::<Value>::new())
                .respond(Vec::<Value>::new()),
        );
        let before = Utc::now().naive_utc();
        wiki.get_recent_changes(7).unwrap();
        wiki.get_recent_changes(30).unwrap();

        let cutoffs: Vec<NaiveDateTime> = wiki
            .transport()
            .calls()
            .iter()
            .map(|call| match call.params.as_slice() {
                [Value::DateTime(dt)] => *dt,
                other => panic!("unexpected params {:?}", other),
            })
            .collect();

        let week = TimeDelta::days(7);
        assert!(cutoffs[0] < before);
        assert!((before - cutoffs[0] - week).num_seconds().abs() < 60);
        assert!(cutoffs[1] < cutoffs[0]);
    }

    #[test]
    fn test_recent_changes_transport_error_propagates() {
        let wiki = client(ScriptedTransport::new().fail(MoinError::Transport("down".into())));
        assert!(wiki.get_recent_changes(7).is_err());
    }

    #[test]
    fn test_history_filters_and_orders() {
        let wiki = client(ScriptedTransport::new().respond(vec![
            record("TestPage", 4, "user2", "initial"),
            record("OtherPage", 9, "user3", "unrelated"),
            record("TestPage", 5, "user1", "fixed typo"),
            Value::Array(vec![Value::from("TestPage"), Value::Int(0)]),
        ]));

        let history = wiki.get_page_history("TestPage");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 5);
        assert_eq!(history[0].author, "user1");
        assert_eq!(history[0].comment, "fixed typo");
        assert!(history[0].last_modified.is_some());
        assert_eq!(history[1].version, 4);
        assert_eq!(wiki.transport().last_call().unwrap().method, "getRecentChanges");
    }

    #[test]
    fn test_history_swallows_failures() {
        let wiki = client(ScriptedTransport::new().fault(-32601, "method not supported"));
        assert!(wiki.get_page_history("TestPage").is_empty());

        let wiki = client(ScriptedTransport::new().fail(MoinError::Transport("down".into())));
        assert!(wiki.get_page_history("TestPage").is_empty());

        let wiki = client(ScriptedTransport::new().respond("not a list"));
        assert!(wiki.get_page_history("TestPage").is_empty());
    }

    #[test]
    fn test_auth_token_shapes() {
        let wiki = client(
            ScriptedTransport::new()
                .respond("abc123")
                .respond(structure([("token", Value::from("def456"))])),
        );
        assert_eq!(wiki.get_auth_token("user", "pw").unwrap(), "abc123");
        assert_eq!(wiki.get_auth_token("user", "pw").unwrap(), "def456");

        let first = &wiki.transport().calls()[0];
        assert_eq!(first.method, "getAuthToken");
        assert_eq!(first.params, vec![Value::from("user"), Value::from("pw")]);
    }

    #[test]
    fn test_auth_token_empty_is_rejected() {
        let wiki = client(ScriptedTransport::new().respond(""));
        let err = wiki.get_auth_token("user", "bad").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
    }

    #[test]
    fn test_put_page_with_explicit_token() {
        let wiki = client(ScriptedTransport::new().respond(put_ok()));
        assert!(wiki.put_page("TestPage", "New content", Some("tok"), None).unwrap());

        let calls = wiki.transport().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "system.multicall");

        let batch: Vec<MethodCall> = calls[0].params[0]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(MethodCall::from_value)
            .collect();
        assert_eq!(batch[0].method, "applyAuthToken");
        assert_eq!(batch[0].params, vec![Value::from("tok")]);
        assert_eq!(batch[1].method, "putPage");
        assert_eq!(
            batch[1].params,
            vec![Value::from("TestPage"), Value::from("New content")]
        );
    }

    #[test]
    fn test_put_page_uses_stored_token() {
        let (_dir, store) = store_with_token("test-token-456");
        let wiki = client(ScriptedTransport::new().respond(put_ok()).respond(put_ok()))
            .with_store(store, None);

        assert!(wiki.put_page("TestPage", "x", None, Some("test")).unwrap());
        assert!(wiki.put_page("TestPage", "x", None, Some("other")).unwrap());

        let tokens: Vec<Value> = wiki
            .transport()
            .calls()
            .iter()
            .map(|call| {
                let batch = call.params[0].as_array().unwrap();
                MethodCall::from_value(&batch[0]).unwrap().params[0].clone()
            })
            .collect();
        assert_eq!(tokens, vec![Value::from("test-token-456"), Value::from("other-token")]);
    }

    #[test]
    fn test_put_page_falls_back_to_client_alias() {
        let (_dir, store) = store_with_token("default-token");
        let wiki = client(ScriptedTransport::new().respond(put_ok())).with_store(store, Some("other"));
        wiki.put_page("P", "x", None, None).unwrap();

        let call = wiki.transport().last_call().unwrap();
        let batch = call.params[0].as_array().unwrap();
        assert_eq!(
            MethodCall::from_value(&batch[0]).unwrap().params,
            vec![Value::from("other-token")]
        );
    }

    #[test]
    fn test_put_page_without_token_makes_no_call() {
        let (_dir, store) = store_with_token("");
        let wiki = client(ScriptedTransport::new()).with_store(store, None);
        let err = wiki.put_page("TestPage", "x", None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.to_string().contains("test"));
        assert_eq!(wiki.transport().call_count(), 0);

        let bare = client(ScriptedTransport::new());
        let err = bare.put_page("TestPage", "x", Some("  "), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert_eq!(bare.transport().call_count(), 0);
    }

    #[test]
    fn test_put_page_fault_on_either_step() {
        let denied = multicall_response(&[Err(Fault::new(1, "Invalid token")), Ok(Value::Bool(true))]);
        let wiki = client(ScriptedTransport::new().respond(denied));
        let err = wiki.put_page("P", "x", Some("tok"), None).unwrap_err();
        assert!(matches!(err, MoinError::Fault { code: 1, .. }));

        let rejected = multicall_response(&[
            Ok(Value::from("SUCCESS")),
            Err(Fault::new(1, "You are not allowed to edit this page")),
        ]);
        let wiki = client(ScriptedTransport::new().respond(rejected));
        let err = wiki.put_page("P", "x", Some("tok"), None).unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn test_put_page_returns_write_result() {
        let refused = multicall_response(&[Ok(Value::from("SUCCESS")), Ok(Value::Bool(false))]);
        let wiki = client(ScriptedTransport::new().respond(refused));
        assert!(!wiki.put_page("P", "x", Some("tok"), None).unwrap());
    }

    #[test]
    fn test_change_entry_shapes() {
        assert_eq!(
            ChangeEntry::from_value(&Value::from("A")),
            Some(ChangeEntry::Bare("A".into()))
        );
        assert!(ChangeEntry::from_value(&Value::Array(vec![])).is_none());
        assert!(ChangeEntry::from_value(&structure([("author", Value::from("x"))])).is_none());

        let with_int_time = structure([
            ("name", Value::from("A")),
            ("lastModified", Value::Int(1_700_000_000)),
        ]);
        match ChangeEntry::from_value(&with_int_time) {
            Some(ChangeEntry::Record { last_modified, .. }) => assert!(last_modified.is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }
}
