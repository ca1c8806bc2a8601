//! Result sink: fan-out of recognition results to downstream consumers.
//!
//! The connection manager hands every received [`ResultRecord`] to one sink;
//! the sink fans finalized utterances (and optionally partials) out to any
//! number of registered callbacks. Callbacks run on the receive path, so
//! they should be quick; anything slow belongs behind a channel.

use crate::protocol::ResultRecord;

type UtteranceCallback = Box<dyn Fn(&ResultRecord) + Send + Sync>;
type PartialCallback = Box<dyn Fn(&ResultRecord) + Send + Sync>;

/// Fan-out of recognized-text callbacks.
#[derive(Default)]
pub struct ResultSink {
    utterance_callbacks: Vec<UtteranceCallback>,
    partial_callbacks: Vec<PartialCallback>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked once per finalized, punctuated utterance
    /// with non-empty text. Empty completion markers are not forwarded.
    pub fn on_utterance<F>(&mut self, callback: F)
    where
        F: Fn(&ResultRecord) + Send + Sync + 'static,
    {
        self.utterance_callbacks.push(Box::new(callback));
    }

    /// Register a callback invoked for every non-final partial result.
    pub fn on_partial<F>(&mut self, callback: F)
    where
        F: Fn(&ResultRecord) + Send + Sync + 'static,
    {
        self.partial_callbacks.push(Box::new(callback));
    }

    /// Route one record to the registered callbacks.
    pub fn dispatch(&self, record: &ResultRecord) {
        if record.is_final {
            if record.text.is_empty() {
                return;
            }
            for callback in &self.utterance_callbacks {
                callback(record);
            }
        } else {
            for callback in &self.partial_callbacks {
                callback(record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn record(text: &str, is_final: bool) -> ResultRecord {
        ResultRecord {
            mode: "2pass-offline".to_string(),
            text: text.to_string(),
            wav_name: "test".to_string(),
            is_final,
        }
    }

    #[test]
    fn test_final_records_reach_utterance_callbacks() {
        let mut sink = ResultSink::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let captured = Arc::clone(&received);
        sink.on_utterance(move |record| {
            captured.lock().unwrap().push(record.text.clone());
        });

        sink.dispatch(&record("Hello world.", true));
        sink.dispatch(&record("partial", false));

        assert_eq!(*received.lock().unwrap(), vec!["Hello world.".to_string()]);
    }

    #[test]
    fn test_empty_completion_markers_not_forwarded() {
        let mut sink = ResultSink::new();
        let count = Arc::new(Mutex::new(0usize));

        let captured = Arc::clone(&count);
        sink.on_utterance(move |_| {
            *captured.lock().unwrap() += 1;
        });

        sink.dispatch(&record("", true));
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_partials_reach_partial_callbacks() {
        let mut sink = ResultSink::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let captured = Arc::clone(&received);
        sink.on_partial(move |record| {
            captured.lock().unwrap().push(record.text.clone());
        });

        sink.dispatch(&record("hel", false));
        sink.dispatch(&record("hello", false));
        sink.dispatch(&record("Hello.", true));

        assert_eq!(
            *received.lock().unwrap(),
            vec!["hel".to_string(), "hello".to_string()]
        );
    }

    #[test]
    fn test_multiple_utterance_callbacks_all_fire() {
        let mut sink = ResultSink::new();
        let first = Arc::new(Mutex::new(0usize));
        let second = Arc::new(Mutex::new(0usize));

        let captured = Arc::clone(&first);
        sink.on_utterance(move |_| *captured.lock().unwrap() += 1);
        let captured = Arc::clone(&second);
        sink.on_utterance(move |_| *captured.lock().unwrap() += 1);

        sink.dispatch(&record("text", true));

        assert_eq!(*first.lock().unwrap(), 1);
        assert_eq!(*second.lock().unwrap(), 1);
    }
}
