//! HTTP API for group membership and moderation
//!
//! Every route except `/health` needs a caller identity, resolved by the
//! configured [`IdentityProvider`] (forwarded gateway headers by default).
//!
//! ## Groups and membership
//! - `POST /groups` - Create a group (caller becomes admin)
//! - `GET /groups?category=&search=` - Discover groups
//! - `GET /groups/{g}` - Group detail for the caller
//! - `DELETE /groups/{g}` - Delete a group and everything it owns
//! - `POST /groups/{g}/join`, `POST /groups/{g}/leave`
//! - `GET /groups/{g}/members?search=`
//! - `PUT /groups/{g}/members/{m}/role` - Body `{"role": "moderator"}`
//! - `DELETE /groups/{g}/members/{m}`
//!
//! ## Join requests
//! - `POST /groups/{g}/request`
//! - `GET /groups/{g}/requests`
//! - `POST /groups/{g}/requests/{q}/accept`, `POST /groups/{g}/requests/{q}/decline`
//!
//! ## Rules
//! - `GET|POST /groups/{g}/rules`, `PUT|DELETE /groups/{g}/rules/{r}`
//!
//! ## Threads
//! - `POST /groups/{g}/posts`, `GET /groups/{g}/posts?page=&pageSize=`
//! - `POST /posts/{p}/like`
//! - `POST /posts/{p}/comments`, `POST /posts/{p}/comments/{c}/replies`
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST -H "x-actor-id: u1" -H "x-actor-name: Asha" \
//!      -d '{"name":"Satsang","description":"Sunday kirtan","privacy":"public"}' \
//!      http://localhost:8095/groups
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::db::groups::GroupQuery;
use crate::error::SanghaError;
use crate::identity::{ForwardedIdentity, IdentityProvider};
use crate::services::{
    created, error_response, message, ok, PageQuery, RoleInput, Services,
};

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, serde::Deserialize)]
struct MemberSearch {
    #[serde(default)]
    search: Option<String>,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    identity: Arc<dyn IdentityProvider>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            identity: Arc::new(ForwardedIdentity),
            bind_addr,
        }
    }

    /// Replace the identity provider
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), SanghaError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route one request. Never fails; errors become envelopes.
    pub async fn handle_request<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, hyper::Error>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        debug!(method = %parts.method, path = %parts.uri.path(), "Incoming request");

        match self.route(parts, body).await {
            Ok(response) => Ok(response),
            Err(e) => Ok(error_response(e)),
        }
    }

    async fn route<B>(&self, parts: Parts, body: B) -> Result<Response<Full<Bytes>>, SanghaError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = parts.uri.path().to_string();
        let query = parts.uri.query().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if parts.method == Method::GET && segments.as_slice() == ["health"] {
            return self.handle_health();
        }

        let actor = self.identity.resolve(&parts.headers).await?;
        self.services.register_actor(&actor)?;
        let me = actor.id.as_str();
        let svc = &self.services;

        match (parts.method, segments.as_slice()) {
            // Groups
            (Method::POST, ["groups"]) => {
                let input = read_json(body).await?;
                Ok(created(&svc.groups.create_group(me, input)?))
            }
            (Method::GET, ["groups"]) => {
                let q: GroupQuery = parse_query(query)?;
                Ok(ok(&svc.groups.list_groups(me, &q)?))
            }
            (Method::GET, ["groups", g]) => Ok(ok(&svc.groups.get_group(me, g)?)),
            (Method::DELETE, ["groups", g]) => {
                svc.groups.delete_group(me, g)?;
                Ok(message("Group deleted"))
            }

            // Membership ledger
            (Method::POST, ["groups", g, "join"]) => Ok(ok(&svc.groups.join(g, me)?)),
            (Method::POST, ["groups", g, "leave"]) => {
                svc.groups.leave(g, me)?;
                Ok(message("Left the group"))
            }
            (Method::GET, ["groups", g, "members"]) => {
                let q: MemberSearch = parse_query(query)?;
                Ok(ok(&svc.groups.list_members(g, q.search.as_deref())?))
            }
            (Method::PUT, ["groups", g, "members", m, "role"]) => {
                let input: RoleInput = read_json(body).await?;
                let role = input.role.unwrap_or_default();
                Ok(ok(&svc.groups.set_role(g, me, m, &role)?))
            }
            (Method::DELETE, ["groups", g, "members", m]) => {
                svc.groups.remove(g, me, m)?;
                Ok(message("Member removed"))
            }

            // Join requests
            (Method::POST, ["groups", g, "request"]) => Ok(created(&svc.requests.request(g, me)?)),
            (Method::GET, ["groups", g, "requests"]) => Ok(ok(&svc.requests.list_pending(g, me)?)),
            (Method::POST, ["groups", g, "requests", q, "accept"]) => {
                Ok(ok(&svc.requests.accept(g, me, q)?))
            }
            (Method::POST, ["groups", g, "requests", q, "decline"]) => {
                svc.requests.decline(g, me, q)?;
                Ok(message("Join request declined"))
            }

            // Rules
            (Method::GET, ["groups", g, "rules"]) => Ok(ok(&svc.rules.list(g)?)),
            (Method::POST, ["groups", g, "rules"]) => {
                let input = read_json(body).await?;
                Ok(created(&svc.rules.add(g, me, input)?))
            }
            (Method::PUT, ["groups", g, "rules", r]) => {
                let input = read_json(body).await?;
                Ok(ok(&svc.rules.update(g, me, r, input)?))
            }
            (Method::DELETE, ["groups", g, "rules", r]) => {
                svc.rules.remove(g, me, r)?;
                Ok(message("Rule deleted"))
            }

            // Threads
            (Method::POST, ["groups", g, "posts"]) => {
                let input = read_json(body).await?;
                Ok(created(&svc.threads.create_post(g, me, input)?))
            }
            (Method::GET, ["groups", g, "posts"]) => {
                let q: PageQuery = parse_query(query)?;
                Ok(ok(&svc.threads.list_posts(g, &q)?))
            }
            (Method::POST, ["posts", p, "like"]) => Ok(ok(&svc.threads.toggle_like(p, me)?)),
            (Method::POST, ["posts", p, "comments"]) => {
                let input = read_json(body).await?;
                Ok(created(&svc.threads.add_comment(p, me, input)?))
            }
            (Method::POST, ["posts", p, "comments", c, "replies"]) => {
                let input = read_json(body).await?;
                Ok(created(&svc.threads.add_reply(p, c, me, input)?))
            }

            (method, _) => Err(SanghaError::RouteNotFound(format!("{} {}", method, path))),
        }
    }

    /// Health check endpoint
    fn handle_health(&self) -> Result<Response<Full<Bytes>>, SanghaError> {
        let stats = self.services.db.stats()?;
        Ok(ok(&serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "stats": stats,
        })))
    }
}

/// Read a JSON body. An empty body reads as `{}`.
async fn read_json<T, B>(body: B) -> Result<T, SanghaError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| SanghaError::InvalidInput(format!("Unreadable request body: {}", e)))?
        .to_bytes();

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T, SanghaError> {
    serde_urlencoded::from_str(query)
        .map_err(|e| SanghaError::InvalidInput(format!("Invalid query string: {}", e)))
}
