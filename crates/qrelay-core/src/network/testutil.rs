//! Fake network implementations shared by unit tests across crates.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{AuthPoll, InboundEvent, QrChallenge},
    errors::Error,
    network::port::{EventSink, NetworkConnector, NetworkHandle},
    Result,
};

/// Scriptable in-memory stand-in for a live network connection.
#[derive(Default)]
pub struct FakeHandle {
    connects: AtomicUsize,
    authorized: AtomicBool,
    fail_authorized: AtomicBool,
    fail_send: AtomicBool,
    qr_counter: AtomicUsize,
    session: Mutex<String>,
    wait_script: Mutex<VecDeque<std::result::Result<AuthPoll, String>>>,
    sends: Mutex<Vec<(String, String)>>,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

impl FakeHandle {
    pub fn set_authorized(&self, yes: bool) {
        self.authorized.store(yes, Ordering::SeqCst);
    }

    /// Make `is_authorized` fail with an upstream error.
    pub fn fail_authorized_checks(&self, yes: bool) {
        self.fail_authorized.store(yes, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, yes: bool) {
        self.fail_send.store(yes, Ordering::SeqCst);
    }

    pub fn set_session_token(&self, token: &str) {
        *self.session.lock().unwrap() = token.to_string();
    }

    /// Queue outcomes for successive `wait_authorized` calls; an `Err` string
    /// becomes `Error::Upstream`. An empty script yields `Pending`.
    pub fn script_waits(&self, steps: Vec<std::result::Result<AuthPoll, String>>) {
        *self.wait_script.lock().unwrap() = steps.into();
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn qr_calls(&self) -> usize {
        self.qr_counter.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn subscribed(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    /// Deliver an event to the subscribed sink, as the gateway reader would.
    pub async fn fire(&self, event: InboundEvent) -> Result<()> {
        let sink = self
            .sink
            .lock()
            .unwrap()
            .clone()
            .expect("no sink subscribed");
        sink.on_event(event).await
    }
}

#[async_trait]
impl NetworkHandle for FakeHandle {
    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool> {
        if self.fail_authorized.load(Ordering::SeqCst) {
            return Err(Error::Upstream("authorization check failed".into()));
        }
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn begin_qr(&self) -> Result<QrChallenge> {
        let n = self.qr_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(QrChallenge {
            token: format!("qr-{n}"),
            url: format!("tg://login?token=qr-{n}"),
        })
    }

    async fn wait_authorized(
        &self,
        _challenge: &QrChallenge,
        _timeout: Duration,
    ) -> Result<AuthPoll> {
        let step = self.wait_script.lock().unwrap().pop_front();
        match step {
            Some(Ok(poll)) => {
                if poll == AuthPoll::Authorized {
                    self.authorized.store(true, Ordering::SeqCst);
                }
                Ok(poll)
            }
            Some(Err(reason)) => Err(Error::Upstream(reason)),
            None => Ok(AuthPoll::Pending),
        }
    }

    async fn session_token(&self) -> Result<String> {
        Ok(self.session.lock().unwrap().clone())
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Error::Upstream("send failed".into()));
        }
        self.sends
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }

    async fn subscribe(&self, sink: Arc<dyn EventSink>) -> Result<()> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }
}

/// Connector handing out one [`FakeHandle`] per phone.
#[derive(Default)]
pub struct FakeConnector {
    opened: AtomicUsize,
    handles: Mutex<HashMap<String, Arc<FakeHandle>>>,
}

impl FakeConnector {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// The handle for `phone`, creating it if needed so tests can configure
    /// behavior before the first `open`.
    pub fn handle(&self, phone: &str) -> Arc<FakeHandle> {
        self.handles
            .lock()
            .unwrap()
            .entry(phone.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl NetworkConnector for FakeConnector {
    async fn open(&self, phone: &str) -> Result<Arc<dyn NetworkHandle>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.handle(phone))
    }
}
