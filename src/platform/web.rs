//! wasm-bindgen host boundary
//!
//! The page owns the frame loop (`requestAnimationFrame`) and input events;
//! it feeds both into a [`WebSession`] and paints `snapshotJson()`.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::config::SessionConfig;
use crate::error::SubmitError;
use crate::report::{Progress, ScoreRecord, SessionObserver};
use crate::session::Session;
use crate::sim::{Action, DrillKind};

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    // Only fails when a logger is already installed
    let _ = console_log::init_with_level(log::Level::Info);
    log::info!("Drill sim ready");
}

/// JS callbacks registered by the page
#[derive(Default)]
struct JsCallbacks {
    on_progress: Option<js_sys::Function>,
    on_complete: Option<js_sys::Function>,
    on_error: Option<js_sys::Function>,
}

fn call_json<T: serde::Serialize>(callback: Option<&js_sys::Function>, payload: &T) {
    let Some(callback) = callback else {
        return;
    };
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                log::warn!("Host callback threw: {err:?}");
            }
        }
        Err(err) => log::warn!("Could not encode callback payload: {err}"),
    }
}

impl SessionObserver for JsCallbacks {
    fn on_progress(&mut self, progress: &Progress) {
        call_json(self.on_progress.as_ref(), progress);
    }

    fn on_complete(&mut self, record: &ScoreRecord) {
        call_json(self.on_complete.as_ref(), record);
    }

    fn on_error(&mut self, error: &SubmitError) {
        if let Some(callback) = self.on_error.as_ref()
            && let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&error.to_string()))
        {
            log::warn!("Host error callback threw: {err:?}");
        }
    }
}

#[wasm_bindgen]
pub struct WebSession {
    session: Session,
    callbacks: Rc<RefCell<JsCallbacks>>,
}

#[wasm_bindgen]
impl WebSession {
    /// `drill` is a widget id or drill name; `config_json` a `SessionConfig`
    #[wasm_bindgen(constructor)]
    pub fn new(drill: &str, config_json: &str) -> Result<WebSession, JsError> {
        let kind: DrillKind = drill.parse()?;
        let config = SessionConfig::from_json(config_json)?;
        let callbacks = Rc::new(RefCell::new(JsCallbacks::default()));
        let session = Session::from_config(kind, &config)?.with_observer(Rc::clone(&callbacks));
        Ok(WebSession { session, callbacks })
    }

    #[wasm_bindgen(js_name = onProgress)]
    pub fn on_progress(&mut self, callback: js_sys::Function) {
        self.callbacks.borrow_mut().on_progress = Some(callback);
    }

    #[wasm_bindgen(js_name = onComplete)]
    pub fn on_complete(&mut self, callback: js_sys::Function) {
        self.callbacks.borrow_mut().on_complete = Some(callback);
    }

    #[wasm_bindgen(js_name = onError)]
    pub fn on_error(&mut self, callback: js_sys::Function) {
        self.callbacks.borrow_mut().on_error = Some(callback);
    }

    pub fn start(&mut self) {
        self.session.start();
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Feed the time since the previous frame
    pub fn advance(&mut self, dt_ms: f64) {
        self.session.advance(dt_ms.max(0.0) as u64);
    }

    /// Apply an action such as `{"type":"click","x":10,"y":20}`
    pub fn act(&mut self, action_json: &str) -> Result<(), JsError> {
        let action: Action = serde_json::from_str(action_json)?;
        self.session.act(action);
        Ok(())
    }

    #[wasm_bindgen(js_name = snapshotJson)]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        Ok(serde_json::to_string(&self.session.snapshot())?)
    }

    /// Score record once complete, otherwise `undefined`
    #[wasm_bindgen(js_name = recordJson)]
    pub fn record_json(&self) -> Result<Option<String>, JsError> {
        self.session
            .record()
            .map(ScoreRecord::to_json)
            .transpose()
            .map_err(JsError::from)
    }

    pub fn phase(&self) -> String {
        format!("{:?}", self.session.phase())
    }
}
