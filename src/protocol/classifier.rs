//! First-bytes protocol classification.
//!
//! # Responsibilities
//! - Accumulate the first bytes of a fresh connection
//! - Decide HTTP vs store protocol from that prefix alone
//! - Hand the untouched prefix to whichever handler wins
//!
//! # Heuristic
//! The decision is a prefix match, not a grammar. A connection is HTTP when
//! it opens with one of the method tokens in [`HTTP_METHODS`] followed by a
//! space (ASCII case-insensitive). It is store protocol once at least
//! [`MIN_STORE_BYTES`] bytes have arrived and they can no longer grow into
//! such a request line. RESP frames open with `*`, `+`, `-`, `:` or `$`, and
//! inline commands (`PING`, `INFO`) never spell a method plus space, so the
//! two never collide today. Any protocol added later whose first bytes look
//! like `GET ` would be routed to HTTP. The HTTP/2 preface (`PRI * ...`) is
//! not a method token, so prior-knowledge h2 is piped like any other
//! non-HTTP traffic.

use bytes::{Bytes, BytesMut};

/// Method tokens recognised as the start of an HTTP request line.
pub const HTTP_METHODS: &[&[u8]] = &[
    b"GET",
    b"POST",
    b"PUT",
    b"DELETE",
    b"HEAD",
    b"OPTIONS",
    b"PATCH",
    b"TRACE",
    b"CONNECT",
];

/// Bytes required before a non-HTTP prefix is declared store protocol.
pub const MIN_STORE_BYTES: usize = 4;

/// The protocol a connection was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Store,
}

impl Protocol {
    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Store => "store",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification state of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationState {
    /// Not enough bytes yet.
    Unclassified,
    /// Verdict reached.
    Classified(Protocol),
    /// Closed or timed out before a verdict.
    Invalid,
}

/// Outcome of matching a prefix against the method table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodMatch {
    /// Starts with `METHOD `.
    Complete,
    /// Could still become `METHOD ` with more bytes.
    Partial,
    /// Can never be an HTTP request line.
    None,
}

fn match_method(buf: &[u8]) -> MethodMatch {
    let mut partial = false;
    for method in HTTP_METHODS {
        let token_len = method.len() + 1;
        let n = buf.len().min(token_len);
        let head = &buf[..n];

        let method_part = &head[..n.min(method.len())];
        if !method_part.eq_ignore_ascii_case(&method[..method_part.len()]) {
            continue;
        }
        if n < token_len {
            partial = true;
        } else if head[method.len()] == b' ' {
            return MethodMatch::Complete;
        }
    }

    if partial {
        MethodMatch::Partial
    } else {
        MethodMatch::None
    }
}

/// Classify a buffered prefix without consuming it.
pub fn classify(buf: &[u8]) -> Option<Protocol> {
    match match_method(buf) {
        MethodMatch::Complete => Some(Protocol::Http),
        MethodMatch::Partial => None,
        MethodMatch::None if buf.len() >= MIN_STORE_BYTES => Some(Protocol::Store),
        MethodMatch::None => None,
    }
}

/// Per-connection accumulator.
///
/// Owned by the connection's task. Once a verdict is reached further
/// `feed` calls are ignored; the prefix is taken out with
/// [`Classifier::into_prefix`] and moved to the winning handler.
#[derive(Debug)]
pub struct Classifier {
    buf: BytesMut,
    state: ClassificationState,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
            state: ClassificationState::Unclassified,
        }
    }

    /// Append a chunk and re-run classification.
    pub fn feed(&mut self, chunk: &[u8]) -> ClassificationState {
        if self.state != ClassificationState::Unclassified {
            return self.state;
        }

        self.buf.extend_from_slice(chunk);
        if let Some(protocol) = classify(&self.buf) {
            self.state = ClassificationState::Classified(protocol);
        }
        self.state
    }

    /// Give up on this connection (closed early or timed out).
    pub fn invalidate(&mut self) -> ClassificationState {
        if self.state == ClassificationState::Unclassified {
            self.state = ClassificationState::Invalid;
        }
        self.state
    }

    pub fn state(&self) -> ClassificationState {
        self.state
    }

    /// Number of bytes accumulated so far.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Freeze and take the accumulated bytes.
    pub fn into_prefix(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http2_preface_goes_to_store() {
        // Only HTTP/1.x request lines are served on the shared port.
        assert_eq!(
            classify(b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"),
            Some(Protocol::Store)
        );
    }

    fn feed_bytewise(input: &[u8]) -> (ClassificationState, usize) {
        let mut classifier = Classifier::new();
        for (i, b) in input.iter().enumerate() {
            let state = classifier.feed(std::slice::from_ref(b));
            if state != ClassificationState::Unclassified {
                return (state, i + 1);
            }
        }
        (classifier.state(), input.len())
    }

    #[test]
    fn every_method_followed_by_space_is_http() {
        for method in HTTP_METHODS {
            let mut line = method.to_vec();
            line.extend_from_slice(b" /health HTTP/1.1\r\n");
            assert_eq!(classify(&line), Some(Protocol::Http), "{:?}", String::from_utf8_lossy(method));
        }
    }

    #[test]
    fn methods_are_case_insensitive() {
        assert_eq!(classify(b"get / HTTP/1.1\r\n"), Some(Protocol::Http));
        assert_eq!(classify(b"Options * HTTP/1.1\r\n"), Some(Protocol::Http));
    }

    #[test]
    fn resp_frames_are_store() {
        assert_eq!(classify(b"*1\r\n$4\r\nPING\r\n"), Some(Protocol::Store));
        assert_eq!(classify(b"+OK\r\n"), Some(Protocol::Store));
        assert_eq!(classify(b"PING\r\n"), Some(Protocol::Store));
    }

    #[test]
    fn short_non_http_prefix_waits_for_threshold() {
        assert_eq!(classify(b""), None);
        assert_eq!(classify(b"*"), None);
        assert_eq!(classify(b"*1\r"), None);
        assert_eq!(classify(b"*1\r\n"), Some(Protocol::Store));
    }

    #[test]
    fn method_without_space_is_store() {
        assert_eq!(classify(b"GETX"), Some(Protocol::Store));
        assert_eq!(classify(b"GET\r\n"), Some(Protocol::Store));
        assert_eq!(classify(b"POSTED"), Some(Protocol::Store));
    }

    #[test]
    fn partial_long_method_keeps_waiting() {
        assert_eq!(classify(b"POST"), None);
        assert_eq!(classify(b"OPTIO"), None);
        assert_eq!(classify(b"CONNECT"), None);
        assert_eq!(classify(b"DELETE "), Some(Protocol::Http));
    }

    #[test]
    fn bytewise_http_decides_on_the_space() {
        assert_eq!(
            feed_bytewise(b"GET / HTTP/1.1\r\n"),
            (ClassificationState::Classified(Protocol::Http), 4)
        );
        assert_eq!(
            feed_bytewise(b"OPTIONS * HTTP/1.1\r\n"),
            (ClassificationState::Classified(Protocol::Http), 8)
        );
    }

    #[test]
    fn bytewise_resp_decides_at_threshold() {
        assert_eq!(
            feed_bytewise(b"*3\r\n$3\r\nSET\r\n"),
            (ClassificationState::Classified(Protocol::Store), MIN_STORE_BYTES)
        );
    }

    #[test]
    fn prefix_is_exact_concatenation_of_chunks() {
        let input = b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n";
        for split in 1..input.len() {
            let mut classifier = Classifier::new();
            let mut fed = split;
            let mut state = classifier.feed(&input[..split]);
            if state == ClassificationState::Unclassified {
                state = classifier.feed(&input[split..]);
                fed = input.len();
            }
            assert_eq!(state, ClassificationState::Classified(Protocol::Store));
            assert_eq!(&classifier.into_prefix()[..], &input[..fed]);
        }
    }

    #[test]
    fn feed_after_verdict_is_ignored() {
        let mut classifier = Classifier::new();
        classifier.feed(b"GET ");
        classifier.feed(b"/ignored");
        assert_eq!(classifier.buffered(), 4);
        assert_eq!(&classifier.into_prefix()[..], b"GET ");
    }

    #[test]
    fn invalidate_only_applies_while_unclassified() {
        let mut pending = Classifier::new();
        pending.feed(b"*1");
        assert_eq!(pending.invalidate(), ClassificationState::Invalid);
        assert_eq!(pending.feed(b"\r\n"), ClassificationState::Invalid);

        let mut done = Classifier::new();
        done.feed(b"PING");
        assert_eq!(
            done.invalidate(),
            ClassificationState::Classified(Protocol::Store)
        );
    }
}
