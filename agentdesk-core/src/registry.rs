//! Agent registry and desk selectors
//!
//! The registry builds every agent once from fixed definitions and hands
//! out shared references. A [`Desk`] is one of the two pages and fixes the
//! choices offered on it.

use crate::agent::{Agent, Runnable};
use crate::config::DeskConfig;
use crate::credentials::Credentials;
use crate::error::{DeskError, Result};
use crate::llm::{LLMProvider, LLMProviderFactory};
use crate::team::Team;
use crate::tools::builtin::{
    FinanceFeatures, csv_summary_tool, duckduckgo_tool, google_news_tool, yfinance_tools,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A selectable agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentChoice {
    Web,
    News,
    Finance,
    Analyst,
    Team,
}

impl AgentChoice {
    pub const ALL: [AgentChoice; 5] = [
        AgentChoice::Web,
        AgentChoice::News,
        AgentChoice::Finance,
        AgentChoice::Analyst,
        AgentChoice::Team,
    ];

    /// Label shown on the page
    pub fn label(self) -> &'static str {
        match self {
            AgentChoice::Web => "Web Agent",
            AgentChoice::News => "News Agent",
            AgentChoice::Finance => "Finance Agent",
            AgentChoice::Analyst => "Data Analyst",
            AgentChoice::Team => "Both (Team)",
        }
    }

    /// Form and CLI value
    pub fn slug(self) -> &'static str {
        match self {
            AgentChoice::Web => "web",
            AgentChoice::News => "news",
            AgentChoice::Finance => "finance",
            AgentChoice::Analyst => "analyst",
            AgentChoice::Team => "team",
        }
    }
}

impl fmt::Display for AgentChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgentChoice {
    type Err = DeskError;

    /// Accepts a label or a slug, ignoring case
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        AgentChoice::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(s) || c.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| DeskError::UnknownChoice(s.to_string()))
    }
}

/// One of the two pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Desk {
    /// Web, finance and team analysis
    Market,
    /// Web, news, finance and CSV analysis with history and downloads
    Research,
}

impl Desk {
    /// Choices offered on this desk, in display order
    pub fn choices(self) -> &'static [AgentChoice] {
        match self {
            Desk::Market => &[AgentChoice::Web, AgentChoice::Finance, AgentChoice::Team],
            Desk::Research => &[
                AgentChoice::Web,
                AgentChoice::News,
                AgentChoice::Finance,
                AgentChoice::Analyst,
            ],
        }
    }

    /// Parse a choice, rejecting anything this desk does not offer
    pub fn parse_choice(self, value: &str) -> Result<AgentChoice> {
        let choice: AgentChoice = value.parse()?;
        if self.choices().contains(&choice) {
            Ok(choice)
        } else {
            Err(DeskError::UnknownChoice(format!(
                "{} is not offered on the {} desk",
                choice.label(),
                self.slug()
            )))
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Desk::Market => "market",
            Desk::Research => "research",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Desk::Market => "Multi-Agent Financial & Web Analysis Tool",
            Desk::Research => "Multi-Agent Research Desk",
        }
    }

    pub fn subtitle(self) -> &'static str {
        match self {
            Desk::Market => "Ask me about companies, markets, or any other financial info.",
            Desk::Research => "Research a topic with web, news, finance, or data agents.",
        }
    }

    pub fn input_label(self) -> &'static str {
        match self {
            Desk::Market => "Enter your query:",
            Desk::Research => "Enter a topic or question:",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            Desk::Market => "Example: Analyze Tesla, NVDA, and Apple for long-term investment",
            Desk::Research => "Example: Latest news on renewable energy stocks",
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            Desk::Market => "Run Analysis",
            Desk::Research => "Run Agent",
        }
    }

    /// History list and downloads are shown
    pub fn keeps_history(self) -> bool {
        matches!(self, Desk::Research)
    }

    /// CSV upload form is shown
    pub fn accepts_uploads(self) -> bool {
        matches!(self, Desk::Research)
    }
}

impl fmt::Display for Desk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Desk {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(Desk::Market),
            "research" => Ok(Desk::Research),
            other => Err(DeskError::UnknownChoice(format!("unknown desk: {}", other))),
        }
    }
}

/// Every agent, built once
pub struct AgentRegistry {
    web: Arc<Agent>,
    news: Arc<Agent>,
    finance: Arc<Agent>,
    analyst: Arc<Agent>,
    team: Arc<Team>,
}

impl AgentRegistry {
    /// Build all agents against the Groq endpoint
    pub fn build(config: &DeskConfig, credentials: &Credentials) -> Result<Self> {
        let provider = LLMProviderFactory::create(&config.llm, credentials, &config.llm.model)?;
        Self::with_provider(config, provider)
    }

    /// Build all agents on a given provider
    pub fn with_provider(config: &DeskConfig, provider: Arc<dyn LLMProvider>) -> Result<Self> {
        let tools = &config.tools;
        let rounds = config.agents.max_tool_rounds;
        let base = || {
            Agent::builder()
                .provider(Arc::clone(&provider))
                .max_tool_rounds(rounds)
                .temperature(config.llm.temperature)
                .max_tokens(config.llm.max_tokens)
        };

        let web = base()
            .name("Web Agent")
            .role("Search the web for information")
            .tool(duckduckgo_tool(tools)?)
            .instruction("Always include the sources.")
            .show_tool_calls(true)
            .markdown(true)
            .build()?;

        let news = base()
            .name("Google News Agent")
            .description("Find the latest news about a given topic.")
            .tool(google_news_tool(tools)?)
            .instructions([
                "Given a topic, respond with 4 latest news items.",
                "Search for 10 news items and select the top 4 unique ones.",
                "Search in English and French.",
            ])
            .show_tool_calls(true)
            .debug_mode(true)
            .build()?;

        let finance = base()
            .name("Finance Agent")
            .role("Get financial data")
            .tools(yfinance_tools(tools, FinanceFeatures::all())?)
            .instruction("Use tables to display data.")
            .show_tool_calls(true)
            .markdown(true)
            .build()?;

        let analyst = base()
            .name("Data Analyst")
            .role("Summarize and interpret CSV data")
            .tool(csv_summary_tool())
            .instructions([
                format!(
                    "The most recently uploaded CSV file is at {}.",
                    config.upload.path.display()
                ),
                "Run summarize_csv before describing a file.".to_string(),
                "Use tables to display data.".to_string(),
            ])
            .show_tool_calls(true)
            .markdown(true)
            .build()?;

        let team = Team::builder()
            .name("Agent Team")
            .provider(Arc::clone(&provider))
            .agent(news.clone())
            .agent(finance.clone())
            .instructions(["Always include sources.", "Use tables to display data."])
            .show_tool_calls(true)
            .markdown(true)
            .max_tool_rounds(rounds)
            .temperature(config.llm.temperature)
            .max_tokens(config.llm.max_tokens)
            .build()?;

        tracing::info!(
            model = %config.llm.model,
            "Agent registry ready: web, news, finance, analyst, team"
        );

        Ok(Self {
            web: Arc::new(web),
            news: Arc::new(news),
            finance: Arc::new(finance),
            analyst: Arc::new(analyst),
            team: Arc::new(team),
        })
    }

    /// The agent or team behind a choice
    pub fn runnable(&self, choice: AgentChoice) -> Arc<dyn Runnable> {
        match choice {
            AgentChoice::Web => self.web.clone(),
            AgentChoice::News => self.news.clone(),
            AgentChoice::Finance => self.finance.clone(),
            AgentChoice::Analyst => self.analyst.clone(),
            AgentChoice::Team => self.team.clone(),
        }
    }

    pub fn team(&self) -> &Team {
        &self.team
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("web", &self.web.name())
            .field("news", &self.news.name())
            .field("finance", &self.finance.name())
            .field("analyst", &self.analyst.name())
            .field("team", &self.team.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::ScriptedProvider;

    fn registry() -> AgentRegistry {
        AgentRegistry::with_provider(&DeskConfig::default(), Arc::new(ScriptedProvider::default()))
            .unwrap()
    }

    #[test]
    fn test_desk_choices() {
        assert_eq!(
            Desk::Market.choices(),
            &[AgentChoice::Web, AgentChoice::Finance, AgentChoice::Team]
        );
        let labels: Vec<&str> = Desk::Research.choices().iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["Web Agent", "News Agent", "Finance Agent", "Data Analyst"]);
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!("Both (Team)".parse::<AgentChoice>().unwrap(), AgentChoice::Team);
        assert_eq!("finance".parse::<AgentChoice>().unwrap(), AgentChoice::Finance);
        assert_eq!(" web agent ".parse::<AgentChoice>().unwrap(), AgentChoice::Web);
        assert!("Crypto Agent".parse::<AgentChoice>().is_err());
    }

    #[test]
    fn test_desk_rejects_choices_it_does_not_offer() {
        assert_eq!(Desk::Market.parse_choice("team").unwrap(), AgentChoice::Team);
        assert!(matches!(
            Desk::Market.parse_choice("News Agent"),
            Err(DeskError::UnknownChoice(_))
        ));
        assert!(Desk::Research.parse_choice("Both (Team)").is_err());
        assert!("Market".parse::<Desk>().is_ok());
        assert!("other".parse::<Desk>().is_err());
    }

    #[test]
    fn test_web_choice_maps_to_web_agent() {
        let registry = registry();
        assert_eq!(registry.runnable(AgentChoice::Web).name(), "Web Agent");
        assert_eq!(registry.runnable(AgentChoice::News).name(), "Google News Agent");
    }

    #[test]
    fn test_agent_definitions() {
        let registry = registry();

        let tools: Vec<String> = registry
            .finance
            .tools()
            .specs()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            tools,
            vec![
                "get_current_stock_price",
                "get_analyst_recommendations",
                "get_stock_fundamentals",
                "get_company_info"
            ]
        );
        assert!(registry.finance.markdown());
        assert_eq!(registry.finance.instructions(), &["Use tables to display data."]);

        assert!(registry.news.debug_mode());
        assert_eq!(registry.news.instructions().len(), 3);
        assert!(registry.web.tools().get("duckduckgo_search").is_some());
        assert!(registry.analyst.tools().get("summarize_csv").is_some());

        assert_eq!(
            registry.team().member_names(),
            vec!["Google News Agent", "Finance Agent"]
        );
        for choice in AgentChoice::ALL {
            assert!(registry.runnable(choice).show_tool_calls());
        }
    }
}
