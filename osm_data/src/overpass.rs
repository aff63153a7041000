//! Building Overpass QL queries for a bounding box, and fetching them with an on-disk cache.

use anyhow::Result;

use abstutil::Timer;
use geom::Bounds;

use crate::OsmData;

pub const DEFAULT_URL: &str = "https://overpass-api.de/api/interpreter";

/// A union of statements restricted to one area. Every matched way and relation is returned with
/// its nodes and members recursively.
pub struct Query {
    bbox: String,
    statements: Vec<String>,
}

impl Query {
    pub fn new(bounds: &Bounds) -> Query {
        Query {
            bbox: bounds.to_overpass_bbox(),
            statements: Vec::new(),
        }
    }

    /// Accepts either one statement or several separated by `;`, like
    /// `way["building"];relation["building"]`.
    pub fn add<I: AsRef<str>>(mut self, statements: I) -> Query {
        for stmt in statements.as_ref().split(';') {
            let stmt = stmt.trim();
            if !stmt.is_empty() {
                self.statements.push(stmt.to_string());
            }
        }
        self
    }

    pub fn to_ql(&self) -> String {
        let body: String = self
            .statements
            .iter()
            .map(|stmt| format!("{}({});", stmt, self.bbox))
            .collect();
        format!("[out:xml][timeout:250];({});(._;>;);out meta;", body)
    }

    pub fn url(&self, base: &str) -> Result<String> {
        abstio::url_with_params(base, &[("data", &self.to_ql())])
    }

    /// Runs the query and saves the response to `path`, unless `path` already exists. This must be
    /// called with a tokio runtime somewhere.
    pub async fn download(&self, base: &str, path: &str) -> Result<bool> {
        abstio::maybe_download(self.url(base)?, path).await
    }
}

/// Reads a cached Overpass response, downloading it first if needed. An empty result is only a
/// warning.
pub async fn read_or_download(
    query: &Query,
    base: &str,
    path: &str,
    timer: &mut Timer,
) -> Result<OsmData> {
    query.download(base, path).await?;
    let data = crate::read_file(path, timer)?;
    if data.is_empty() {
        warn!("No OSM data were obtained from '{}'", path);
    } else {
        info!("Read '{}': {}", path, data.describe());
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_text() {
        let bounds = Bounds {
            min_x: -3.1,
            min_y: 40.0,
            max_x: -3.0,
            max_y: 40.1,
        };
        let q = Query::new(&bounds)
            .add("way[\"building\"];relation[\"building\"];")
            .add("node[\"addr:street\"][\"addr:housenumber\"]");
        assert_eq!(
            q.to_ql(),
            "[out:xml][timeout:250];(way[\"building\"](40,-3.1,40.1,-3);\
             relation[\"building\"](40,-3.1,40.1,-3);\
             node[\"addr:street\"][\"addr:housenumber\"](40,-3.1,40.1,-3););\
             (._;>;);out meta;"
        );
        assert!(q.url(DEFAULT_URL).unwrap().starts_with(DEFAULT_URL));
    }

    #[tokio::test]
    async fn cached_response_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("{}/current_highway.osm", dir.path().display());
        abstio::write_file(&path, b"<osm version=\"0.6\"></osm>").unwrap();
        let q = Query::new(&Bounds::new()).add("way[\"highway\"][\"name\"]");
        let data = read_or_download(&q, "http://127.0.0.1:9", &path, &mut Timer::throwaway())
            .await
            .unwrap();
        assert!(data.is_empty());
    }
}
