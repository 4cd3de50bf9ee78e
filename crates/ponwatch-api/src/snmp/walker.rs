// ── Table walking over SNMP v2c ──
//
// `TableWalker` is the seam between the poller and the wire. The poller
// only ever asks for "all rows under this column" or "this scalar", so a
// scripted walker is enough to exercise every correlation path in tests.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};

use super::oid::{Oid, RowIndex};
use crate::error::Error;

/// Upper bound on rows per column, guards against agents that loop.
const MAX_ROWS_PER_WALK: usize = 16_384;

/// An owned SNMP value, decoupled from the session buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    Unsigned(u64),
    Counter(u64),
    Timeticks(u32),
    Octets(Vec<u8>),
    Null,
}

impl SnmpValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Unsigned(v) | Self::Counter(v) => i64::try_from(*v).ok(),
            Self::Timeticks(v) => Some(i64::from(*v)),
            Self::Octets(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            Self::Null => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => u64::try_from(*v).ok(),
            Self::Unsigned(v) | Self::Counter(v) => Some(*v),
            Self::Timeticks(v) => Some(u64::from(*v)),
            Self::Octets(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            Self::Null => None,
        }
    }

    /// Printable text with trailing NULs and whitespace removed.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Octets(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                let trimmed = text.trim_end_matches('\0').trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            }
            Self::Integer(v) => Some(v.to_string()),
            Self::Unsigned(v) | Self::Counter(v) => Some(v.to_string()),
            Self::Timeticks(v) => Some(v.to_string()),
            Self::Null => None,
        }
    }

    pub fn as_octets(&self) -> Option<&[u8]> {
        match self {
            Self::Octets(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Read access to an agent's tables.
pub trait TableWalker {
    /// Every `(row index, value)` under `column`, in agent order.
    fn walk(&mut self, column: &Oid) -> Result<Vec<(RowIndex, SnmpValue)>, Error>;

    /// A single scalar. `Ok(None)` when the agent has no such object.
    fn get(&mut self, oid: &Oid) -> Result<Option<SnmpValue>, Error>;
}

/// Connection tuning for [`SnmpSession`].
#[derive(Debug, Clone)]
pub struct SnmpOptions {
    pub port: u16,
    pub timeout: Duration,
    /// Extra attempts per request after a timeout.
    pub retries: u32,
    pub max_repetitions: u32,
}

impl Default for SnmpOptions {
    fn default() -> Self {
        Self {
            port: 161,
            timeout: Duration::from_secs(3),
            retries: 1,
            max_repetitions: 24,
        }
    }
}

/// Blocking SNMP v2c session. Run it on a blocking worker, never on the
/// async scheduler.
pub struct SnmpSession {
    inner: snmp::SyncSession,
    target: SocketAddr,
    options: SnmpOptions,
}

impl SnmpSession {
    pub fn open(host: &str, community: &SecretString, options: SnmpOptions) -> Result<Self, Error> {
        let target = (host, options.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Snmp {
                message: format!("cannot resolve {host}"),
            })?;
        let inner = snmp::SyncSession::new(
            target,
            community.expose_secret().as_bytes(),
            Some(options.timeout),
            0,
        )?;
        debug!(agent = %target, "opened SNMP session");
        Ok(Self {
            inner,
            target,
            options,
        })
    }

    /// One GETBULK round trip, retried on failure.
    fn bulk(&mut self, from: &[u32]) -> Result<Vec<(Vec<u32>, SnmpValue)>, Error> {
        let timeout_secs = self.options.timeout.as_secs();
        let mut attempt = 0;
        loop {
            match self.inner.getbulk(&[from], 0, self.options.max_repetitions) {
                Ok(pdu) => {
                    if pdu.error_status != 0 {
                        return Err(Error::Snmp {
                            message: format!(
                                "{} answered error status {} at index {}",
                                self.target, pdu.error_status, pdu.error_index
                            ),
                        });
                    }
                    let mut out = Vec::new();
                    for (name, value) in pdu.varbinds {
                        let mut buf = [0u32; 128];
                        let Ok(oid) = name.read_name(&mut buf) else {
                            continue;
                        };
                        out.push((oid.to_vec(), convert(&value)));
                    }
                    return Ok(out);
                }
                Err(e) if attempt < self.options.retries => {
                    attempt += 1;
                    trace!(agent = %self.target, attempt, error = ?e, "GETBULK retry");
                }
                Err(snmp::SnmpError::ReceiveError) => return Err(Error::Timeout { timeout_secs }),
                Err(e) => {
                    return Err(Error::Snmp {
                        message: format!("{e:?}"),
                    });
                }
            }
        }
    }
}

impl TableWalker for SnmpSession {
    fn walk(&mut self, column: &Oid) -> Result<Vec<(RowIndex, SnmpValue)>, Error> {
        let mut rows = Vec::new();
        let mut cursor = column.as_slice().to_vec();

        'walk: loop {
            let batch = self.bulk(&cursor)?;
            if batch.is_empty() {
                break;
            }
            for (name, value) in batch {
                let Some(index) = next_row(column, &cursor, &name) else {
                    break 'walk;
                };
                rows.push((index, value));
                cursor = name;
            }
            if rows.len() >= MAX_ROWS_PER_WALK {
                debug!(column = %column, "walk truncated at row limit");
                break;
            }
        }

        trace!(column = %column, rows = rows.len(), "walk complete");
        Ok(rows)
    }

    fn get(&mut self, oid: &Oid) -> Result<Option<SnmpValue>, Error> {
        let timeout_secs = self.options.timeout.as_secs();
        let pdu = match self.inner.get(oid.as_slice()) {
            Ok(pdu) => pdu,
            Err(snmp::SnmpError::ReceiveError) => return Err(Error::Timeout { timeout_secs }),
            Err(e) => {
                return Err(Error::Snmp {
                    message: format!("{e:?}"),
                });
            }
        };
        if pdu.error_status != 0 {
            return Ok(None);
        }
        Ok(pdu
            .varbinds
            .into_iter()
            .next()
            .and_then(|(_, value)| scalar(&value)))
    }
}

/// Row index of `name` when the walk should keep going: still under
/// `column` and strictly past `cursor`. Past the column means end of
/// table (or end of view); a non-increasing OID means the agent is looping.
fn next_row(column: &Oid, cursor: &[u32], name: &[u32]) -> Option<RowIndex> {
    if name <= cursor {
        return None;
    }
    column.index_of(name)
}

/// A scalar GET answer. Exceptions the client cannot decode arrive as
/// `Null` and read as absent.
fn scalar(value: &snmp::Value<'_>) -> Option<SnmpValue> {
    match convert(value) {
        SnmpValue::Null => None,
        other => Some(other),
    }
}

fn convert(value: &snmp::Value<'_>) -> SnmpValue {
    match value {
        snmp::Value::Integer(v) => SnmpValue::Integer(*v),
        snmp::Value::Counter32(v) => SnmpValue::Counter(u64::from(*v)),
        snmp::Value::Counter64(v) => SnmpValue::Counter(*v),
        snmp::Value::Unsigned32(v) => SnmpValue::Unsigned(u64::from(*v)),
        snmp::Value::Timeticks(v) => SnmpValue::Timeticks(*v),
        snmp::Value::OctetString(bytes) | snmp::Value::Opaque(bytes) => {
            SnmpValue::Octets(bytes.to_vec())
        }
        snmp::Value::IpAddress(octets) => SnmpValue::Octets(octets.to_vec()),
        _ => SnmpValue::Null,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn walk_continues_inside_the_column() {
        let column: Oid = "1.3.6.1.4.1.17409.2.3.4.1.1.2".parse().unwrap();
        let cursor = column.as_slice().to_vec();
        let mut name = cursor.clone();
        name.extend([16_779_520, 3]);
        assert!(next_row(&column, &cursor, &name).is_some());
    }

    #[test]
    fn walk_stops_past_the_column() {
        let column: Oid = "1.3.6.1.4.1.17409.2.3.4.1.1.2".parse().unwrap();
        let cursor = column.as_slice().to_vec();
        let next_column: Oid = "1.3.6.1.4.1.17409.2.3.4.1.1.3.1".parse().unwrap();
        assert_eq!(next_row(&column, &cursor, next_column.as_slice()), None);
    }

    #[test]
    fn walk_stops_when_the_agent_repeats_itself() {
        let column: Oid = "1.3.6.1.4.1.17409.2.3.4.1.1.2".parse().unwrap();
        let mut cursor = column.as_slice().to_vec();
        cursor.extend([5, 9]);
        let mut earlier = column.as_slice().to_vec();
        earlier.extend([5, 1]);
        assert_eq!(next_row(&column, &cursor, &cursor), None);
        assert_eq!(next_row(&column, &cursor, &earlier), None);
    }

    #[test]
    fn scalar_null_reads_as_absent() {
        assert_eq!(scalar(&snmp::Value::Null), None);
        assert_eq!(scalar(&snmp::Value::Boolean(true)), None);
        assert_eq!(
            scalar(&snmp::Value::Timeticks(4200)),
            Some(SnmpValue::Timeticks(4200))
        );
        assert_eq!(
            scalar(&snmp::Value::OctetString(b"C-DATA FD1608")),
            Some(SnmpValue::Octets(b"C-DATA FD1608".to_vec()))
        );
    }

    #[test]
    fn text_strips_trailing_nuls() {
        let v = SnmpValue::Octets(b"FTTH-0042\0\0".to_vec());
        assert_eq!(v.as_text().as_deref(), Some("FTTH-0042"));
        assert_eq!(SnmpValue::Octets(b"\0".to_vec()).as_text(), None);
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(SnmpValue::Integer(-2245).as_i64(), Some(-2245));
        assert_eq!(SnmpValue::Integer(-1).as_u64(), None);
        assert_eq!(SnmpValue::Counter(u64::MAX).as_i64(), None);
        assert_eq!(SnmpValue::Octets(b" 1250 ".to_vec()).as_u64(), Some(1250));
        assert_eq!(SnmpValue::Null.as_u64(), None);
    }
}
