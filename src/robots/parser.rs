//! Robots.txt parser implementation
//!
//! Allow/disallow evaluation is delegated to the robotstxt crate; the
//! `Crawl-delay` extension is read here since that crate ignores it.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,
    /// Set when the site has no robots.txt (404/410)
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots for a site without robots.txt
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given product token
    ///
    /// # Arguments
    ///
    /// * `url` - The full URL to check
    /// * `agent` - The crawler's product token (e.g., "SeedlineBot")
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }

    /// Gets the `Crawl-delay` (seconds) that applies to the given product token
    ///
    /// A group naming the agent takes precedence over the `*` group. Within a
    /// group the first valid value wins.
    pub fn crawl_delay(&self, agent: &str) -> Option<f64> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }

        let agent = agent.to_ascii_lowercase();
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut for_agent: Option<f64> = None;
        let mut for_wildcard: Option<f64> = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    // A user-agent line after any rule starts a new group
                    if in_rules {
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(value.to_ascii_lowercase());
                }
                "crawl-delay" => {
                    in_rules = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }
                    if group_agents.iter().any(|ua| *ua == agent) {
                        for_agent.get_or_insert(delay);
                    } else if group_agents.iter().any(|ua| ua == "*") {
                        for_wildcard.get_or_insert(delay);
                    }
                }
                _ => in_rules = true,
            }
        }

        for_agent.or(for_wildcard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "SeedlineBot";

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("https://example.com/any/path", BOT));
        assert!(robots.is_allowed("https://example.com/admin", BOT));
    }

    #[test]
    fn test_parse_disallow_all() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("https://example.com/", BOT));
        assert!(!robots.is_allowed("https://example.com/page", BOT));
    }

    #[test]
    fn test_parse_disallow_specific() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert!(robots.is_allowed("https://example.com/", BOT));
        assert!(robots.is_allowed("https://example.com/page", BOT));
        assert!(!robots.is_allowed("https://example.com/admin", BOT));
        assert!(!robots.is_allowed("https://example.com/admin/users", BOT));
    }

    #[test]
    fn test_parse_allow_overrides_longer_match() {
        let robots =
            ParsedRobots::from_content("User-agent: *\nDisallow: /private\nAllow: /private/public");
        assert!(!robots.is_allowed("https://example.com/private", BOT));
        assert!(robots.is_allowed("https://example.com/private/public", BOT));
    }

    #[test]
    fn test_group_for_our_agent_wins() {
        let content = "User-agent: SeedlineBot\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("https://example.com/page", BOT));
        assert!(robots.is_allowed("https://example.com/page", "OtherBot"));
    }

    #[test]
    fn test_garbage_content_allows() {
        let robots = ParsedRobots::from_content("This is not valid robots.txt {{{");
        assert!(robots.is_allowed("https://example.com/any/path", BOT));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 10\nDisallow: /admin");
        assert_eq!(robots.crawl_delay(BOT), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_specific_agent() {
        let content = "User-agent: SeedlineBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay(BOT), Some(5.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_after_other_rules() {
        let content = "User-agent: *\nDisallow: /tmp\nCrawl-delay: 2.5";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay(BOT), Some(2.5));
    }

    #[test]
    fn test_crawl_delay_multiple_user_agents_in_group() {
        let content = "User-agent: BotA\nUser-agent: SeedlineBot\nCrawl-delay: 3";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay(BOT), Some(3.0));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_ignores_invalid_values() {
        let content = "User-agent: *\nCrawl-delay: soon\nCrawl-delay: -1 # nope";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay(BOT), None);
    }

    #[test]
    fn test_crawl_delay_case_insensitive() {
        let robots = ParsedRobots::from_content("user-agent: seedlinebot\ncrawl-delay: 7");
        assert_eq!(robots.crawl_delay(BOT), Some(7.0));
    }
}
