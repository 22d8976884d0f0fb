//! TCP listener for length-delimited RPC frames.

use std::net::SocketAddr;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use telemon_core::protocol::frame::{decode_rpc_frame, response_payload, RpcFrame, FLAG_RESPONSE, RPC_VERSION};
use telemon_core::{MetricsError, Result, ServerResponse};

use crate::app_state::AppState;

/// Accept connections until `cancel` fires.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, methods = ?state.rpc().registered(), "rpc listener started");
    }
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_conn(stream, peer, state.clone(), cancel.clone()));
                }
                Err(e) => warn!(error = %e, "rpc accept failed"),
            },
        }
    }
    info!("rpc listener stopped");
}

async fn handle_conn(stream: TcpStream, peer: SocketAddr, state: AppState, cancel: CancellationToken) {
    debug!(%peer, "rpc connection opened");
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = framed.next() => next,
        };
        let buf = match next {
            None => break,
            Some(Ok(buf)) => buf.freeze(),
            Some(Err(e)) => {
                warn!(%peer, error = %e, "rpc read failed");
                break;
            }
        };

        let reply = handle_frame(&state, peer, buf).await;
        if let Err(e) = framed.send(reply.encode()).await {
            warn!(%peer, error = %e, "rpc write failed");
            break;
        }
    }
    debug!(%peer, "rpc connection closed");
}

/// Reply frame for a frame that could not even be decoded.
fn orphan_reply(resp: &ServerResponse) -> RpcFrame {
    RpcFrame {
        v: RPC_VERSION,
        method: 0,
        flags: FLAG_RESPONSE,
        seq: None,
        payload: response_payload(resp).unwrap_or_default(),
    }
}

async fn handle_frame(state: &AppState, peer: SocketAddr, buf: Bytes) -> RpcFrame {
    let frame = match decode_rpc_frame(buf) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(%peer, error = %e, "bad rpc frame");
            state.stats().observe("rpc:invalid", e.client_code().http_status());
            return orphan_reply(&ServerResponse::from(&e));
        }
    };

    let route = format!("rpc:{}", state.rpc().name_of(frame.method));
    let result = call(state, peer, &frame).await;
    let status = result.as_ref().map(|_| 200).unwrap_or_else(|e| e.client_code().http_status());
    state.stats().observe(&route, status);

    let mut resp = match result {
        Ok(resp) => resp,
        Err(e) => {
            if e.is_client_error() {
                warn!(%peer, method = frame.method, error = %e, "rpc call rejected");
            } else {
                error!(%peer, method = frame.method, error = %e, "rpc call failed");
            }
            ServerResponse::from(&e)
        }
    };
    if let Some(signer) = state.signer() {
        if let Err(e) = signer.sign_response(&mut resp) {
            error!(error = %e, "rpc reply signing failed");
        }
    }

    match response_payload(&resp) {
        Ok(payload) => frame.reply(payload),
        Err(e) => {
            error!(error = %e, "rpc reply encoding failed");
            frame.reply(Bytes::new())
        }
    }
}

async fn call(state: &AppState, peer: SocketAddr, frame: &RpcFrame) -> Result<ServerResponse> {
    if frame.is_response() {
        return Err(MetricsError::BadRequest("unexpected response frame".into()));
    }
    if let Some(subnet) = state.subnet() {
        subnet.check_ip(peer.ip())?;
    }
    state.rpc().dispatch(state, frame).await
}
