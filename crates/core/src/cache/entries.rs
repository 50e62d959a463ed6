//! Bucket and entry operations for the SQLite store.
//!
//! Responses are stored as status, a JSON list of header pairs and the raw
//! body bytes, keyed by bucket name and request key hash. Header values are
//! hex-encoded so non-UTF-8 bytes survive the round trip.

use super::connection::SqliteBucketStore;
use super::{BucketName, BucketStore};
use crate::Error;
use crate::request::{RequestKey, Response};
use bytes::Bytes;
use http::StatusCode;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Serialize headers as ordered `[name, hex(value)]` pairs.
pub(crate) fn encode_headers(headers: &HeaderMap) -> Result<String, Error> {
    let pairs: Vec<(&str, String)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), hex::encode(value.as_bytes())))
        .collect();
    Ok(serde_json::to_string(&pairs)?)
}

pub(crate) fn decode_headers(json: &str) -> Result<HeaderMap, Error> {
    let pairs: Vec<(String, String)> = serde_json::from_str(json)?;
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Codec(e.to_string()))?;
        let bytes = hex::decode(&value).map_err(|e| Error::Codec(e.to_string()))?;
        let value = HeaderValue::from_bytes(&bytes).map_err(|e| Error::Codec(e.to_string()))?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// One response flattened into column values.
struct EntryRow {
    hash: String,
    method: String,
    url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(key: &RequestKey, response: &Response) -> Result<Self, Error> {
        Ok(Self {
            hash: key.hash.clone(),
            method: key.method.as_str().to_string(),
            url: key.url.clone(),
            status: response.status.as_u16(),
            headers_json: encode_headers(&response.headers)?,
            body: response.body.to_vec(),
        })
    }
}

/// Create the bucket if needed and upsert every row inside one transaction.
///
/// Either all rows land or, on any failure, none do and the bucket is not
/// created.
fn write_rows(conn: &mut rusqlite::Connection, bucket: &str, rows: &[EntryRow]) -> Result<(), Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    tx.execute("INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)", params![bucket, &now])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO entries (bucket, key_hash, method, url, status, headers_json, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(bucket, key_hash) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                status = excluded.status,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
        )?;
        for row in rows {
            stmt.execute(params![
                bucket,
                &row.hash,
                &row.method,
                &row.url,
                row.status,
                &row.headers_json,
                &row.body,
                &now
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

#[async_trait::async_trait]
impl BucketStore for SqliteBucketStore {
    async fn open(&self, bucket: &BucketName) -> Result<(), Error> {
        let name = bucket.as_str().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, bucket: &BucketName, key: &RequestKey) -> Result<Option<Response>, Error> {
        let name = bucket.as_str().to_string();
        let hash = key.hash.clone();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt =
                    conn.prepare("SELECT status, headers_json, body FROM entries WHERE bucket = ?1 AND key_hash = ?2")?;

                let result = stmt.query_row(params![name, hash], |row| {
                    Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?))
                });

                match result {
                    Ok((status, headers_json, body)) => {
                        let status = StatusCode::from_u16(status).map_err(|e| Error::Codec(e.to_string()))?;
                        let headers = decode_headers(&headers_json)?;
                        Ok(Some(Response { status, headers, body: Bytes::from(body) }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Uses UPSERT semantics: inserts if the key doesn't exist,
    /// replaces the stored snapshot if it does.
    async fn put(&self, bucket: &BucketName, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let name = bucket.as_str().to_string();
        let row = EntryRow::new(key, response)?;

        self.conn
            .call(move |conn| write_rows(conn, &name, std::slice::from_ref(&row)))
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, bucket: &BucketName, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let name = bucket.as_str().to_string();
        let rows = entries
            .iter()
            .map(|(key, response)| EntryRow::new(key, response))
            .collect::<Result<Vec<_>, _>>()?;

        self.conn
            .call(move |conn| write_rows(conn, &name, &rows))
            .await
            .map_err(Error::from)
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Entries go with the bucket through `ON DELETE CASCADE`.
    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn count(&self, name: &str) -> Result<usize, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE bucket = ?1", params![name], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}
