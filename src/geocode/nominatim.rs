//! Geocoding through a Nominatim `/search` endpoint.

use anyhow::{anyhow, Context, Result};
use reqwest::header;
use url::Url;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::debug;

use super::Geocoder;
use crate::TARGET_GEOCODE;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_USER_AGENT: &str = "orarifarmacie";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

pub struct Nominatim {
    client: reqwest::Client,
    endpoint: Url,
    min_interval: Duration,
    request_timeout: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Nominatim {
    /// `min_interval` is the pause enforced between two requests; the public
    /// instance allows one request per second.
    pub fn new(endpoint: &str, user_agent: &str, min_interval: Duration) -> Result<Self> {
        Self::with_request_timeout(endpoint, user_agent, min_interval, REQUEST_TIMEOUT)
    }

    /// Like [`Nominatim::new`]; `request_timeout` bounds a whole request,
    /// reading the response body included.
    pub fn with_request_timeout(
        endpoint: &str,
        user_agent: &str,
        min_interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid geocoder URL: {}", endpoint))?;
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build geocoder HTTP client: {}", e))?;

        Ok(Nominatim {
            client,
            endpoint,
            min_interval,
            request_timeout,
            last_request: Mutex::new(None),
        })
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Geocoder for Nominatim {
    async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
        self.throttle().await;

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "json")
            .append_pair("limit", "1");

        debug!(target: TARGET_GEOCODE, "Geocoding request: {}", url);
        let response = timeout(
            self.request_timeout,
            self.client
                .get(url)
                .header(header::ACCEPT, "application/json")
                .send(),
        )
        .await
        .map_err(|_| anyhow!("Geocoder timed out after {:?}", self.request_timeout))??
        .error_for_status()?;

        let places: Vec<Place> = response.json().await.context("Malformed geocoder response")?;
        parse_first_place(&places)
    }
}

fn parse_first_place(places: &[Place]) -> Result<Option<(f64, f64)>> {
    let Some(place) = places.first() else {
        return Ok(None);
    };
    let latitude = place
        .lat
        .parse::<f64>()
        .with_context(|| format!("Bad latitude {:?}", place.lat))?;
    let longitude = place
        .lon
        .parse::<f64>()
        .with_context(|| format!("Bad longitude {:?}", place.lon))?;
    Ok(Some((latitude, longitude)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_place() {
        let places: Vec<Place> = serde_json::from_str(
            r#"[{"place_id": 1, "lat": "45.0703393", "lon": "7.6869005", "display_name": "Torino"},
                {"place_id": 2, "lat": "0", "lon": "0"}]"#,
        )
        .unwrap();
        assert_eq!(
            parse_first_place(&places).unwrap(),
            Some((45.0703393, 7.6869005))
        );
    }

    #[test]
    fn test_empty_response_is_no_match() {
        assert_eq!(parse_first_place(&[]).unwrap(), None);
    }

    #[test]
    fn test_unparsable_coordinate_is_an_error() {
        let places = vec![Place {
            lat: "north".to_string(),
            lon: "7.0".to_string(),
        }];
        assert!(parse_first_place(&places).is_err());
    }

    #[tokio::test]
    async fn test_stalled_response_body_times_out() {
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpListener;

        // Sends the headers, then never the promised body.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n[")
                .await
                .unwrap();
            sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let geocoder = Nominatim::with_request_timeout(
            &format!("http://{}/search", addr),
            DEFAULT_USER_AGENT,
            Duration::ZERO,
            Duration::from_millis(300),
        )
        .unwrap();

        let result = timeout(Duration::from_secs(5), geocoder.geocode("Via Roma 1 Torino TO"))
            .await
            .expect("request was not bounded");
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(Nominatim::new("not a url", DEFAULT_USER_AGENT, Duration::ZERO).is_err());
    }
}
