//! Test doubles shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::application::ports::{
    CentralSystemClient, ClientError, Connector, InboundHandler, SharedClient, TransportSecurity,
};
use crate::application::services::simulation::MeterSimulator;
use crate::domain::{Measurand, MeterDelta};

/// Scripted central system that records every outbound call.
pub struct MockClient {
    calls: Mutex<Vec<(String, Value)>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    start_status: Mutex<String>,
    stop_status: Mutex<String>,
    next_transaction_id: AtomicI32,
    connected: AtomicBool,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
            start_status: Mutex::new("Accepted".into()),
            stop_status: Mutex::new("Accepted".into()),
            next_transaction_id: AtomicI32::new(1),
            connected: AtomicBool::new(true),
        })
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, action: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == action)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Statuses sent in StatusNotification, in order.
    pub fn statuses(&self) -> Vec<String> {
        self.calls_for("StatusNotification")
            .iter()
            .filter_map(|payload| payload["status"].as_str().map(str::to_string))
            .collect()
    }

    pub async fn wait_for_statuses(&self, count: usize) {
        for _ in 0..300 {
            if self.statuses().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} status notifications, got {:?}",
            count,
            self.statuses()
        );
    }

    pub fn fail_action(&self, action: &str) {
        self.failing.lock().unwrap().insert(action.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn delay_action(&self, action: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(action.to_string(), delay);
    }

    pub fn set_start_status(&self, status: &str) {
        *self.start_status.lock().unwrap() = status.to_string();
    }

    pub fn set_stop_status(&self, status: &str) {
        *self.stop_status.lock().unwrap() = status.to_string();
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn response(&self, action: &str) -> Value {
        match action {
            "BootNotification" => json!({
                "currentTime": Utc::now().to_rfc3339(),
                "interval": 300,
                "status": "Accepted",
            }),
            "Heartbeat" => json!({ "currentTime": Utc::now().to_rfc3339() }),
            "StartTransaction" => json!({
                "transactionId": self.next_transaction_id.fetch_add(1, Ordering::SeqCst),
                "idTagInfo": { "status": self.start_status.lock().unwrap().clone() },
            }),
            "StopTransaction" => json!({
                "idTagInfo": { "status": self.stop_status.lock().unwrap().clone() },
            }),
            _ => json!({}),
        }
    }
}

#[async_trait]
impl CentralSystemClient for MockClient {
    async fn call(&self, action: &str, payload: Value) -> Result<Value, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), payload));

        let delay = self.delays.lock().unwrap().get(action).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(action) {
            return Err(ClientError::Transport(format!("scripted {} failure", action)));
        }
        Ok(self.response(action))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Hands out one shared [`MockClient`] and records each connection attempt.
pub struct MockConnector {
    client: Arc<MockClient>,
    securities: Mutex<Vec<TransportSecurity>>,
    handler: Mutex<Option<Arc<dyn InboundHandler>>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            client: MockClient::new(),
            securities: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn client(&self) -> Arc<MockClient> {
        self.client.clone()
    }

    /// Transport security of every connection attempt, oldest first.
    pub fn securities(&self) -> Vec<TransportSecurity> {
        self.securities.lock().unwrap().clone()
    }

    /// Inbound handler registered by the latest connection.
    pub fn handler(&self) -> Option<Arc<dyn InboundHandler>> {
        self.handler.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _central_system_url: &str,
        _charge_point_id: &str,
        security: TransportSecurity,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<SharedClient, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.securities.lock().unwrap().push(security);
        *self.handler.lock().unwrap() = Some(handler);
        self.client.set_connected(true);
        Ok(self.client.clone())
    }
}

/// Constant meter increments with an all-or-nothing sample selection.
#[derive(Debug, Clone, Copy)]
pub struct FixedMeterSimulator {
    delta: MeterDelta,
    selected: bool,
}

impl FixedMeterSimulator {
    pub fn new(delta: MeterDelta) -> Self {
        Self {
            delta,
            selected: true,
        }
    }

    pub fn with_selection(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

impl Default for FixedMeterSimulator {
    fn default() -> Self {
        Self::new(MeterDelta {
            energy: 100,
            power: 1_000,
            voltage: 120,
            current: 8,
            temperature: 20,
            battery: 1,
        })
    }
}

impl MeterSimulator for FixedMeterSimulator {
    fn next_delta(&self) -> MeterDelta {
        self.delta
    }

    fn include(&self, _measurand: Measurand) -> bool {
        self.selected
    }
}
