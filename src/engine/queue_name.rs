use std::fmt;

use crate::error::EngineError;

/// A composite `(namespace, queue)` key, encoded on the wire as
/// `q/{namespace}/{queue}` per §6.3.
///
/// `/` is disallowed in either component so key derivation never collides
/// across the ready/dead-letter/timer/pool key families.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct QueueName {
    pub namespace: String,
    pub queue: String,
}

impl QueueName {
    pub fn new(
        namespace: impl Into<String>,
        queue: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let namespace = namespace.into();
        let queue = queue.into();

        if namespace.is_empty() || queue.is_empty() {
            return Err(EngineError::invalid("namespace and queue must be non-empty"));
        }
        if namespace.contains('/') || queue.contains('/') {
            return Err(EngineError::invalid(
                "namespace and queue may not contain '/'",
            ));
        }

        Ok(QueueName { namespace, queue })
    }

    pub fn ready_key(&self) -> String {
        format!("q/{}/{}", self.namespace, self.queue)
    }

    pub fn dead_letter_key(&self) -> String {
        format!("dl/{}/{}", self.namespace, self.queue)
    }

    pub fn timer_key(&self) -> String {
        format!("t/{}/{}", self.namespace, self.queue)
    }

    pub fn pool_key(&self, job_id: &crate::id::JobId) -> String {
        format!("j/{}/{}/{}", self.namespace, self.queue, job_id)
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_slash_in_namespace_or_queue() {
        assert!(QueueName::new("a/b", "q").is_err());
        assert!(QueueName::new("ns", "a/b").is_err());
    }

    #[test]
    fn rejects_empty_components() {
        assert!(QueueName::new("", "q").is_err());
        assert!(QueueName::new("ns", "").is_err());
    }

    #[test]
    fn keys_follow_the_wire_format() {
        let qn = QueueName::new("ns", "q").unwrap();
        assert_eq!(qn.ready_key(), "q/ns/q");
        assert_eq!(qn.dead_letter_key(), "dl/ns/q");
        assert_eq!(qn.timer_key(), "t/ns/q");
    }
}
