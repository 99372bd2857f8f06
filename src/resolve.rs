use std::collections::HashMap;

use itertools::Itertools;
use tracing::{debug, info};

use crate::corpus::SealedCorpus;
use crate::error::ResolveError;
use crate::parser::groups::{Disambiguation, DisambiguationEntry};
use crate::parser::text::plain_summary;

/// A title that has its own row: an article, or a disambiguation
/// (declared in the source or generated for a diverging alias).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Terminal {
    Article(String),
    Disambiguation(String),
}

impl Terminal {
    pub fn title(&self) -> &str {
        match self {
            Terminal::Article(t) | Terminal::Disambiguation(t) => t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub terminal: Terminal,
    /// Alias hops taken to reach the terminal.
    pub steps: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub alias: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Redirect(Redirect),
    Disambiguation(Disambiguation),
}

/// Chain follower over a sealed corpus.
///
/// Every alias that resolves is cached, so each title is followed at most
/// once per resolver no matter how many chains pass through it.
pub struct Resolver<'a> {
    corpus: &'a SealedCorpus,
    cache: HashMap<String, Resolution>,
}

impl<'a> Resolver<'a> {
    pub fn new(corpus: &'a SealedCorpus) -> Self {
        Resolver {
            corpus,
            cache: HashMap::new(),
        }
    }

    /// Follow `title` through aliases until it reaches a title with its own
    /// row. Articles take precedence over declared disambiguations, which
    /// take precedence over aliases.
    pub fn follow(&mut self, title: &str) -> Result<Resolution, ResolveError> {
        self.follow_chain(title, &mut Vec::new())
    }

    fn follow_chain(&mut self, title: &str, chain: &mut Vec<String>) -> Result<Resolution, ResolveError> {
        let corpus = self.corpus;
        if corpus.registry().contains(title) {
            return Ok(Resolution {
                terminal: Terminal::Article(title.to_string()),
                steps: 0,
            });
        }
        if corpus.is_disambiguation(title) {
            return Ok(Resolution {
                terminal: Terminal::Disambiguation(title.to_string()),
                steps: 0,
            });
        }
        if let Some(cached) = self.cache.get(title) {
            return Ok(cached.clone());
        }
        let Some(targets) = corpus.aliases().targets(title) else {
            return Err(ResolveError::Dangling {
                alias: chain.last().cloned().unwrap_or_else(|| title.to_string()),
                target: title.to_string(),
            });
        };
        if chain.iter().any(|t| t == title) {
            let mut cycle = chain.clone();
            cycle.push(title.to_string());
            return Err(ResolveError::Cycle { chain: cycle });
        }

        chain.push(title.to_string());
        let resolved = self.resolve_targets(targets, chain);
        chain.pop();
        let resolved = resolved?;

        let resolution = match resolved.as_slice() {
            [only] => Resolution {
                terminal: only.terminal.clone(),
                steps: only.steps + 1,
            },
            _ => Resolution {
                terminal: Terminal::Disambiguation(title.to_string()),
                steps: 1,
            },
        };
        self.cache.insert(title.to_string(), resolution.clone());
        Ok(resolution)
    }

    /// Resolve every distinct target, keeping one resolution per distinct
    /// terminal in the order the targets were listed.
    fn resolve_targets(
        &mut self,
        targets: &[String],
        chain: &mut Vec<String>,
    ) -> Result<Vec<Resolution>, ResolveError> {
        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets.iter().unique() {
            resolved.push(self.follow_chain(target, chain)?);
        }
        Ok(resolved
            .into_iter()
            .unique_by(|r| r.terminal.clone())
            .collect())
    }

    fn entry(&self, terminal: &Terminal) -> DisambiguationEntry {
        let description = match terminal {
            Terminal::Article(title) => self
                .corpus
                .registry()
                .lookup(title)
                .map(|a| plain_summary(&a.text))
                .unwrap_or_default(),
            Terminal::Disambiguation(_) => String::new(),
        };
        DisambiguationEntry {
            link: terminal.title().to_string(),
            description,
        }
    }
}

/// Turn every alias into a redirect or a disambiguation, in alias
/// insertion order.
///
/// A redirect records the alias's first raw target, not the terminal it
/// resolves to. Any dangling target or cycle fails the whole pass.
pub fn resolve(corpus: &SealedCorpus) -> Result<Vec<Record>, ResolveError> {
    let mut resolver = Resolver::new(corpus);
    let mut records = Vec::with_capacity(corpus.aliases().len());
    let mut shadowed = 0;

    for (alias, targets) in corpus.aliases().iter() {
        let mut chain = vec![alias.to_string()];
        let resolved = resolver.resolve_targets(targets, &mut chain)?;

        if corpus.registry().contains(alias) || corpus.is_disambiguation(alias) {
            debug!(alias, "alias shadowed by a title with its own row");
            shadowed += 1;
            continue;
        }

        if resolved.len() == 1 {
            records.push(Record::Redirect(Redirect {
                alias: alias.to_string(),
                target: targets[0].clone(),
            }));
        } else {
            records.push(Record::Disambiguation(Disambiguation {
                title: alias.to_string(),
                entries: resolved.iter().map(|r| resolver.entry(&r.terminal)).collect(),
            }));
        }
    }

    info!(
        aliases = corpus.aliases().len(),
        edges = corpus.aliases().edge_count(),
        records = records.len(),
        shadowed,
        "aliases resolved"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::parser::groups::{ArticleCandidate, PageExtract};
    use url::Url;

    fn corpus(articles: &[&str], aliases: &[(&str, &str)]) -> SealedCorpus {
        let mut c = Corpus::new();
        c.ingest(
            &Url::parse("https://docs.example.org/p.html").unwrap(),
            PageExtract {
                articles: articles
                    .iter()
                    .map(|t| ArticleCandidate {
                        title: t.to_string(),
                        anchor: Some(t.to_lowercase()),
                        text: format!("<p>About {t}.</p>"),
                        categories: vec![],
                        related: vec![],
                        image: None,
                    })
                    .collect(),
                aliases: aliases
                    .iter()
                    .map(|(a, t)| (a.to_string(), t.to_string()))
                    .collect(),
                disambiguations: vec![],
            },
        );
        c.seal()
    }

    fn redirect(alias: &str, target: &str) -> Record {
        Record::Redirect(Redirect {
            alias: alias.into(),
            target: target.into(),
        })
    }

    #[test]
    fn single_target_redirects() {
        let c = corpus(&["Bar"], &[("Baz", "Bar")]);
        assert_eq!(resolve(&c).unwrap(), vec![redirect("Baz", "Bar")]);
    }

    #[test]
    fn chain_of_k_takes_k_steps() {
        let c = corpus(&["Art"], &[("a1", "a2"), ("a2", "a3"), ("a3", "Art")]);
        let mut r = Resolver::new(&c);
        assert_eq!(r.follow("a1").unwrap().steps, 3);
        assert_eq!(r.follow("a3").unwrap().steps, 1);
        assert_eq!(r.follow("Art").unwrap().steps, 0);
        assert_eq!(r.follow("a1").unwrap().terminal, Terminal::Article("Art".into()));
    }

    #[test]
    fn redirect_keeps_immediate_target() {
        let c = corpus(&["Art"], &[("a1", "a2"), ("a2", "Art")]);
        let records = resolve(&c).unwrap();
        assert_eq!(records, vec![redirect("a1", "a2"), redirect("a2", "Art")]);
    }

    #[test]
    fn converging_targets_collapse_to_redirect() {
        let c = corpus(&["Qux"], &[("Foo", "Bar"), ("Foo", "Baz"), ("Bar", "Qux"), ("Baz", "Qux")]);
        let records = resolve(&c).unwrap();
        assert_eq!(records[0], redirect("Foo", "Bar"));
        assert!(records.iter().all(|r| matches!(r, Record::Redirect(_))));
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn repeated_raw_target_is_not_ambiguous() {
        let c = corpus(&["Bar"], &[("Foo", "Bar"), ("Foo", "Bar")]);
        assert_eq!(resolve(&c).unwrap(), vec![redirect("Foo", "Bar")]);
    }

    #[test]
    fn diverging_targets_disambiguate() {
        let c = corpus(&["Bar", "Baz"], &[("Foo", "Bar"), ("Foo", "Baz")]);
        let records = resolve(&c).unwrap();
        assert_eq!(records.len(), 1);
        let Record::Disambiguation(d) = &records[0] else {
            panic!("expected a disambiguation, got {:?}", records[0]);
        };
        assert_eq!(d.title, "Foo");
        let links: Vec<_> = d.entries.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(links, vec!["Bar", "Baz"]);
        assert_eq!(d.entries[0].description, "About Bar.");
    }

    #[test]
    fn ambiguous_alias_inside_chain_is_terminal() {
        let c = corpus(&["Bar", "Baz"], &[("Foo", "Bar"), ("Foo", "Baz"), ("F", "Foo")]);
        let mut r = Resolver::new(&c);
        assert_eq!(r.follow("F").unwrap().terminal, Terminal::Disambiguation("Foo".into()));
        let records = resolve(&c).unwrap();
        assert_eq!(records[1], redirect("F", "Foo"));
    }

    #[test]
    fn dangling_target_is_fatal() {
        let c = corpus(&["Bar"], &[("Foo", "Missing")]);
        assert_eq!(
            resolve(&c).unwrap_err(),
            ResolveError::Dangling {
                alias: "Foo".into(),
                target: "Missing".into()
            }
        );
    }

    #[test]
    fn cycle_is_fatal() {
        let c = corpus(&[], &[("A", "B"), ("B", "A")]);
        let err = resolve(&c).unwrap_err();
        assert_eq!(
            err,
            ResolveError::Cycle {
                chain: vec!["A".into(), "B".into(), "A".into()]
            }
        );
        assert_eq!(err.to_string(), "redirect cycle: A -> B -> A");
    }

    #[test]
    fn deep_chain_with_repeated_targets() {
        let depth = 64;
        let mut aliases = Vec::new();
        let names: Vec<String> = (0..depth).map(|i| format!("a{i}")).collect();
        for i in 0..depth {
            let next = if i + 1 == depth { "Art" } else { names[i + 1].as_str() };
            aliases.push((names[i].as_str(), next));
            aliases.push((names[i].as_str(), next));
        }
        let c = corpus(&["Art"], &aliases);
        let records = resolve(&c).unwrap();
        assert_eq!(records.len(), depth);
        assert_eq!(records[0], redirect("a0", "a1"));
        assert!(records.iter().all(|r| matches!(r, Record::Redirect(_))));

        let mut r = Resolver::new(&c);
        let res = r.follow("a0").unwrap();
        assert_eq!(res.steps, depth);
        assert_eq!(res.terminal, Terminal::Article("Art".into()));
    }

    #[test]
    fn diamond_ladder_converges() {
        // x_i and y_i both point at x_{i+1} and y_{i+1}: 2^depth paths.
        let depth = 48;
        let xs: Vec<String> = (0..=depth).map(|i| format!("x{i}")).collect();
        let ys: Vec<String> = (0..=depth).map(|i| format!("y{i}")).collect();
        let mut aliases = Vec::new();
        for i in 0..depth {
            for from in [&xs[i], &ys[i]] {
                aliases.push((from.as_str(), xs[i + 1].as_str()));
                aliases.push((from.as_str(), ys[i + 1].as_str()));
            }
        }
        aliases.push((xs[depth].as_str(), "Art"));
        aliases.push((ys[depth].as_str(), "Art"));
        let c = corpus(&["Art"], &aliases);
        let records = resolve(&c).unwrap();
        assert_eq!(records.len(), 2 * depth + 2);
        assert!(records.iter().all(|r| matches!(r, Record::Redirect(_))));
    }

    #[test]
    fn alias_shadowed_by_article_is_skipped() {
        let c = corpus(&["Foo", "Bar"], &[("Foo", "Bar"), ("Baz", "Foo")]);
        assert_eq!(resolve(&c).unwrap(), vec![redirect("Baz", "Foo")]);
    }
}
