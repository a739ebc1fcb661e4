//! Fakes shared by pipeline tests

use std::sync::{Arc, Mutex};

use serenity::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::models::{ChangeDirection, DeliveryPayload, OhlcBar, QuoteSnapshot, QuoteStats, SeriesSummary, Term};
use crate::services::chart_service::ChartRenderer;
use crate::services::dispatch_service::Destination;
use crate::utils::{DeliverError, RenderError};

/// A canned HTTP response for paths starting with `path`.
/// `status == 0` accepts the connection and never answers.
#[derive(Clone)]
pub struct Route {
    pub path: &'static str,
    pub status: u16,
    pub body: String,
}

impl Route {
    pub fn new(path: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self { path, status, body: body.into() }
    }
}

/// Serve `routes` on an ephemeral local port and return its base URL
pub async fn serve(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let route = routes.iter().find(|r| path.starts_with(r.path)).cloned();
                let (status, body) = match route {
                    Some(r) if r.status == 0 => {
                        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                        return;
                    }
                    Some(r) => (r.status, r.body),
                    None => (404, "not found".to_string()),
                };

                let response = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

/// Quote page carrying every field the extractor looks for
pub fn quote_page(price: &str) -> String {
    format!(
        r#"<html><body>
            <span class="QuoteStrip-lastPrice">{}</span>
            <span class="QuoteStrip-changeDown">-0.012</span>
            <div class="QuoteStrip-lastTradeTime">Last | 3:00 PM EDT</div>
            <li class="Summary-stat"><span class="Summary-label">Open</span><span class="Summary-value">4.20%</span></li>
        </body></html>"#,
        price
    )
}

/// Yield CSV with `rows` consecutive days from 2024-01-01, newest first
pub fn yield_csv(rows: u32) -> String {
    yield_csv_from(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), rows)
}

/// Yield CSV with `rows` consecutive days from `start` for every tracked term, newest first
pub fn yield_csv_from(start: chrono::NaiveDate, rows: u32) -> String {
    let mut csv_text = String::from("Date,1 Mo,5 Yr,7 Yr,10 Yr,20 Yr,30 Yr\n");
    for i in (0..rows).rev() {
        let date = start + chrono::Duration::days(i as i64);
        let wobble = ((i * 7) % 5) as f64 / 100.0;
        csv_text.push_str(&format!(
            "{},5.5,{:.2},{:.2},{:.2},{:.2},{:.2}\n",
            date.format("%m/%d/%Y"),
            3.9 + wobble,
            4.0 + wobble,
            4.1 + wobble,
            4.4 + wobble,
            4.3 + wobble
        ));
    }
    csv_text
}

/// Minimal payload for dispatch tests
pub fn sample_payload(term: Term) -> DeliveryPayload {
    DeliveryPayload {
        term,
        snapshot: QuoteSnapshot {
            last_price: "4.10%".to_string(),
            change_text: "+0.02".to_string(),
            change_direction: ChangeDirection::Up,
            stats: QuoteStats::new(),
            last_trade_time: "Last | 4:00 PM".to_string(),
        },
        summary: SeriesSummary::default(),
        chart_png: vec![1, 2, 3],
        last_trade_time: "Last | 4:00 PM".to_string(),
    }
}

/// Renderer that records how many bars it was handed and on which thread
#[derive(Default)]
pub struct FakeRenderer {
    pub bar_counts: Mutex<Vec<usize>>,
    pub threads: Mutex<Vec<std::thread::ThreadId>>,
}

impl ChartRenderer for FakeRenderer {
    fn render(&self, _title: &str, bars: &[OhlcBar]) -> Result<Vec<u8>, RenderError> {
        self.bar_counts.lock().unwrap().push(bars.len());
        self.threads.lock().unwrap().push(std::thread::current().id());
        if bars.len() < 2 {
            return Err(RenderError::NotEnoughData(bars.len()));
        }
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

/// Destination that records deliveries and notices, optionally failing deliveries
#[derive(Default)]
pub struct RecordingDestination {
    pub fail_delivery: bool,
    pub fail_notice: bool,
    pub delivered: Mutex<Vec<Term>>,
    pub notices: Mutex<Vec<String>>,
}

impl RecordingDestination {
    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail_delivery: true, ..Self::default() })
    }

    pub fn delivered(&self) -> Vec<Term> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Destination for RecordingDestination {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), DeliverError> {
        if self.fail_delivery {
            return Err(DeliverError::SendFailed("channel is gone".to_string()));
        }
        self.delivered.lock().unwrap().push(payload.term);
        Ok(())
    }

    async fn notify(&self, text: &str) -> Result<(), DeliverError> {
        if self.fail_notice {
            return Err(DeliverError::SendFailed("notice rejected".to_string()));
        }
        self.notices.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}
