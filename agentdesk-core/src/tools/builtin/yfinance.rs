//! Yahoo Finance toolkit
//!
//! Four tools share one HTTP client. Each can be switched on independently
//! through [`FinanceFeatures`]:
//!
//! - `get_current_stock_price` reads the chart endpoint
//! - `get_analyst_recommendations`, `get_stock_fundamentals` and
//!   `get_company_info` read `quoteSummary` modules
//!
//! `quoteSummary` needs a session cookie and a matching crumb. The crumb is
//! fetched on first use, cached, and refreshed once when Yahoo answers 401.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::required_str;
use crate::config::ToolSettings;
use crate::error::Result;
use crate::tools::{
    BoxedTool, HandlerTool, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolSchema,
};

/// Which finance tools to bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinanceFeatures {
    pub stock_price: bool,
    pub analyst_recommendations: bool,
    pub stock_fundamentals: bool,
    pub company_info: bool,
}

impl FinanceFeatures {
    /// Every tool enabled
    pub fn all() -> Self {
        Self {
            stock_price: true,
            analyst_recommendations: true,
            stock_fundamentals: true,
            company_info: true,
        }
    }

    /// Nothing enabled
    pub fn none() -> Self {
        Self {
            stock_price: false,
            analyst_recommendations: false,
            stock_fundamentals: false,
            company_info: false,
        }
    }
}

impl Default for FinanceFeatures {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinanceFunction {
    StockPrice,
    AnalystRecommendations,
    StockFundamentals,
    CompanyInfo,
}

impl FinanceFunction {
    fn tool_name(self) -> &'static str {
        match self {
            FinanceFunction::StockPrice => "get_current_stock_price",
            FinanceFunction::AnalystRecommendations => "get_analyst_recommendations",
            FinanceFunction::StockFundamentals => "get_stock_fundamentals",
            FinanceFunction::CompanyInfo => "get_company_info",
        }
    }

    fn description(self) -> &'static str {
        match self {
            FinanceFunction::StockPrice => "Get the current stock price for a ticker symbol.",
            FinanceFunction::AnalystRecommendations => {
                "Get analyst buy/hold/sell recommendation trends for a ticker symbol."
            }
            FinanceFunction::StockFundamentals => {
                "Get fundamental data (market cap, P/E, EPS, 52 week range) for a ticker symbol."
            }
            FinanceFunction::CompanyInfo => {
                "Get company profile, sector, and key financial figures for a ticker symbol."
            }
        }
    }

    /// `quoteSummary` modules read by this function
    fn modules(self) -> &'static str {
        match self {
            FinanceFunction::StockPrice => "",
            FinanceFunction::AnalystRecommendations => "recommendationTrend",
            FinanceFunction::StockFundamentals => {
                "assetProfile,price,summaryDetail,defaultKeyStatistics,financialData"
            }
            FinanceFunction::CompanyInfo => "assetProfile,price,summaryDetail,financialData",
        }
    }
}

struct YahooFinanceClient {
    client: reqwest::Client,
    base_url: String,
    cookie_url: String,
    crumb: Mutex<Option<String>>,
}

impl YahooFinanceClient {
    async fn send(&self, url: &str, query: &[(&str, &str)]) -> std::result::Result<reqwest::Response, ToolError> {
        Ok(self.client.get(url).query(query).send().await?)
    }

    async fn read_json(url: &str, response: reqwest::Response) -> std::result::Result<Value, ToolError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ToolError::not_found(format!("No data found at {}", url)));
        }
        if !status.is_success() {
            return Err(ToolError::transient(format!(
                "Yahoo Finance request failed with status: {}",
                status
            )));
        }
        Ok(response.json().await?)
    }

    /// Cached crumb, fetched when absent or when `refresh` is set
    async fn crumb(&self, refresh: bool) -> std::result::Result<String, ToolError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref().filter(|_| !refresh) {
            return Ok(crumb.clone());
        }

        // Only the cookie matters here; the page itself answers 404.
        self.client.get(&self.cookie_url).send().await?;

        let response = self
            .send(&format!("{}/v1/test/getcrumb", self.base_url), &[])
            .await?;
        let status = response.status();
        let crumb = response.text().await?.trim().to_string();
        if !status.is_success() || crumb.is_empty() || crumb.contains('<') {
            return Err(ToolError::transient(format!(
                "Could not obtain a Yahoo Finance crumb (status: {})",
                status
            )));
        }

        tracing::debug!("Fetched Yahoo Finance crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn chart(&self, symbol: &str) -> std::result::Result<Value, ToolError> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        let response = self
            .send(&url, &[("range", "1d"), ("interval", "1d")])
            .await?;
        let body = Self::read_json(&url, response).await?;

        if let Some(error) = body.pointer("/chart/error").filter(|e| !e.is_null()) {
            return Err(ToolError::not_found(describe_api_error(symbol, error)));
        }
        body.pointer("/chart/result/0/meta")
            .cloned()
            .ok_or_else(|| ToolError::invalid_response(format!("No chart data for {}", symbol)))
    }

    async fn quote_summary(&self, symbol: &str, modules: &str) -> std::result::Result<Value, ToolError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url,
            urlencoding::encode(symbol)
        );

        let crumb = self.crumb(false).await?;
        let mut response = self
            .send(&url, &[("modules", modules), ("crumb", crumb.as_str())])
            .await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!("Yahoo Finance rejected the crumb, refreshing");
            let crumb = self.crumb(true).await?;
            response = self
                .send(&url, &[("modules", modules), ("crumb", crumb.as_str())])
                .await?;
        }
        let body = Self::read_json(&url, response).await?;

        if let Some(error) = body.pointer("/quoteSummary/error").filter(|e| !e.is_null()) {
            return Err(ToolError::not_found(describe_api_error(symbol, error)));
        }
        body.pointer("/quoteSummary/result/0")
            .cloned()
            .ok_or_else(|| ToolError::invalid_response(format!("No summary data for {}", symbol)))
    }
}

fn describe_api_error(symbol: &str, error: &Value) -> String {
    let detail = error
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    format!("Error fetching data for {}: {}", symbol, detail)
}

/// Pick a `quoteSummary` field, preferring the formatted value
fn pick(summary: &Value, module: &str, key: &str) -> Value {
    match summary.get(module).and_then(|m| m.get(key)) {
        Some(Value::Object(obj)) => obj
            .get("fmt")
            .or_else(|| obj.get("raw"))
            .cloned()
            .unwrap_or(Value::Null),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

fn collect(summary: &Value, fields: &[(&str, &str, &str)]) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(label, module, key)| (label.to_string(), pick(summary, module, key)))
        .filter(|(_, value)| !value.is_null())
        .collect();
    Value::Object(map)
}

struct FinanceHandler {
    client: Arc<YahooFinanceClient>,
    function: FinanceFunction,
}

#[async_trait]
impl ToolHandler for FinanceHandler {
    async fn handle(&self, args: Value, _ctx: &ToolExecutionContext) -> std::result::Result<Value, ToolError> {
        let symbol = required_str(&args, "symbol")?.to_ascii_uppercase();
        tracing::info!("Fetching {} for {}", self.function.tool_name(), symbol);

        match self.function {
            FinanceFunction::StockPrice => {
                let meta = self.client.chart(&symbol).await?;
                let price = meta
                    .get("regularMarketPrice")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| {
                        ToolError::invalid_response(format!("Could not fetch current price for {}", symbol))
                    })?;
                let currency = meta.get("currency").and_then(Value::as_str).unwrap_or("USD");
                Ok(Value::String(format!("{}: {:.4} {}", symbol, price, currency)))
            }
            FinanceFunction::AnalystRecommendations => {
                let summary = self
                    .client
                    .quote_summary(&symbol, self.function.modules())
                    .await?;
                let trend = summary
                    .pointer("/recommendationTrend/trend")
                    .cloned()
                    .unwrap_or_else(|| json!([]));
                Ok(json!({ "symbol": symbol, "trend": trend }))
            }
            FinanceFunction::StockFundamentals => {
                let summary = self
                    .client
                    .quote_summary(&symbol, self.function.modules())
                    .await?;
                let mut fundamentals = collect(
                    &summary,
                    &[
                        ("company_name", "price", "longName"),
                        ("sector", "assetProfile", "sector"),
                        ("market_cap", "price", "marketCap"),
                        ("pe_ratio", "summaryDetail", "trailingPE"),
                        ("forward_pe", "summaryDetail", "forwardPE"),
                        ("pb_ratio", "defaultKeyStatistics", "priceToBook"),
                        ("dividend_yield", "summaryDetail", "dividendYield"),
                        ("eps", "defaultKeyStatistics", "trailingEps"),
                        ("beta", "summaryDetail", "beta"),
                        ("52_week_high", "summaryDetail", "fiftyTwoWeekHigh"),
                        ("52_week_low", "summaryDetail", "fiftyTwoWeekLow"),
                        ("profit_margins", "financialData", "profitMargins"),
                    ],
                );
                fundamentals["symbol"] = Value::String(symbol);
                Ok(fundamentals)
            }
            FinanceFunction::CompanyInfo => {
                let summary = self
                    .client
                    .quote_summary(&symbol, self.function.modules())
                    .await?;
                let mut info = collect(
                    &summary,
                    &[
                        ("name", "price", "longName"),
                        ("sector", "assetProfile", "sector"),
                        ("industry", "assetProfile", "industry"),
                        ("website", "assetProfile", "website"),
                        ("employees", "assetProfile", "fullTimeEmployees"),
                        ("summary", "assetProfile", "longBusinessSummary"),
                        ("current_price", "financialData", "currentPrice"),
                        ("currency", "price", "currency"),
                        ("market_cap", "price", "marketCap"),
                        ("ebitda", "financialData", "ebitda"),
                        ("total_revenue", "financialData", "totalRevenue"),
                        ("recommendation", "financialData", "recommendationKey"),
                        ("target_mean_price", "financialData", "targetMeanPrice"),
                    ],
                );
                info["symbol"] = Value::String(symbol);
                Ok(info)
            }
        }
    }
}

fn finance_tool(client: &Arc<YahooFinanceClient>, function: FinanceFunction) -> BoxedTool {
    Arc::new(HandlerTool::new(
        ToolMetadata::new(function.tool_name(), function.description())
            .with_returns("Data for the symbol from Yahoo Finance")
            .with_tag("finance"),
        ToolSchema::new(json!({
            "type": "object",
            "properties": {
                "symbol": { "type": "string", "description": "The stock ticker symbol, e.g. NVDA" }
            },
            "required": ["symbol"]
        })),
        FinanceHandler {
            client: Arc::clone(client),
            function,
        },
    ))
}

/// Build the enabled Yahoo Finance tools, in a fixed order
pub fn yfinance_tools(settings: &ToolSettings, features: FinanceFeatures) -> Result<Vec<BoxedTool>> {
    let client = Arc::new(YahooFinanceClient {
        client: settings.http_client_with_cookies()?,
        base_url: settings.yahoo_finance_url.trim_end_matches('/').to_string(),
        cookie_url: settings.yahoo_cookie_url.clone(),
        crumb: Mutex::new(None),
    });

    let enabled = [
        (features.stock_price, FinanceFunction::StockPrice),
        (features.analyst_recommendations, FinanceFunction::AnalystRecommendations),
        (features.stock_fundamentals, FinanceFunction::StockFundamentals),
        (features.company_info, FinanceFunction::CompanyInfo),
    ];

    Ok(enabled
        .into_iter()
        .filter(|(on, _)| *on)
        .map(|(_, function)| finance_tool(&client, function))
        .collect())
}
