use std::collections::{HashMap, HashSet};

use crate::{
    error::{Error, Result},
    handler::Handler,
    http::{Method, parser::normalize_path},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    /// Captures a non-empty run of characters within one segment.
    Variable(String),
}

/// A compiled path template such as `/users/<id>` or `/files/<stem>.txt`.
///
/// Matching is anchored at both ends and segment-by-segment, so a
/// placeholder never spans a `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    template: String,
    segments: Vec<Vec<Piece>>,
}

impl PathPattern {
    pub fn parse(template: &str) -> Result<Self> {
        let normalized = normalize_path(template);
        let mut seen = HashSet::new();
        let mut segments = Vec::new();

        for segment in normalized[1..].split('/') {
            let pieces = parse_segment(segment).map_err(|reason| Error::InvalidTemplate {
                template: template.to_string(),
                reason,
            })?;
            for piece in &pieces {
                if let Piece::Variable(name) = piece {
                    if !seen.insert(name.clone()) {
                        return Err(Error::InvalidTemplate {
                            template: template.to_string(),
                            reason: format!("placeholder `{}` appears twice", name),
                        });
                    }
                }
            }
            segments.push(pieces);
        }

        Ok(PathPattern {
            template: normalized,
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().flatten().filter_map(|piece| match piece {
            Piece::Variable(name) => Some(name.as_str()),
            Piece::Literal(_) => None,
        })
    }

    /// Matches a whole normalized path, returning the captured variables.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = path.strip_prefix('/')?;
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captures = Vec::new();
        for (pieces, part) in self.segments.iter().zip(parts) {
            if !match_pieces(pieces, part, &mut captures) {
                return None;
            }
        }
        Some(captures.into_iter().collect())
    }
}

fn parse_segment(segment: &str) -> std::result::Result<Vec<Piece>, String> {
    let mut pieces = Vec::new();
    let mut rest = segment;

    while let Some(open) = rest.find('<') {
        if open > 0 {
            pieces.push(Piece::Literal(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('>')
            .ok_or_else(|| "unterminated `<`".to_string())?;
        let name = &after[..close];
        if name.is_empty() {
            return Err("empty placeholder name".to_string());
        }
        if let Some(Piece::Variable(previous)) = pieces.last() {
            return Err(format!(
                "placeholders `{}` and `{}` are adjacent",
                previous, name
            ));
        }
        pieces.push(Piece::Variable(name.to_string()));
        rest = &after[close + 1..];
    }

    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest.to_string()));
    }
    Ok(pieces)
}

fn match_pieces(pieces: &[Piece], input: &str, captures: &mut Vec<(String, String)>) -> bool {
    match pieces.split_first() {
        None => input.is_empty(),
        Some((Piece::Literal(literal), rest)) => input
            .strip_prefix(literal.as_str())
            .is_some_and(|tail| match_pieces(rest, tail, captures)),
        Some((Piece::Variable(name), rest)) => {
            // Longest capture first, backing off until the rest matches.
            for end in (1..=input.len()).rev() {
                if !input.is_char_boundary(end) {
                    continue;
                }
                let mark = captures.len();
                captures.push((name.clone(), input[..end].to_string()));
                if match_pieces(rest, &input[end..], captures) {
                    return true;
                }
                captures.truncate(mark);
            }
            false
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: Handler,
}

#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    /// Path variables captured by the route's pattern.
    pub params: HashMap<String, String>,
}

impl RouteMatch<'_> {
    pub fn handler(&self) -> &Handler {
        &self.route.handler
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// The route table. Built before serving starts and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Router { routes: Vec::new() }
    }

    /// Registers `handler` for `template` under each of `methods`. Every
    /// method gets its own entry, appended after all existing ones.
    ///
    /// # Arguments
    ///
    /// * `template` - The path template, e.g. `/users/<id>`.
    /// * `handler` - The handler to run on a match.
    /// * `methods` - The methods the route answers.
    ///
    /// # Returns
    ///
    /// The router, for chaining, or `InvalidTemplate` if `template` does
    /// not compile.
    pub fn register(
        &mut self,
        template: &str,
        handler: Handler,
        methods: &[Method],
    ) -> Result<&mut Self> {
        let pattern = PathPattern::parse(template)?;
        for method in methods {
            self.routes.push(Route {
                method: method.clone(),
                pattern: pattern.clone(),
                handler: handler.clone(),
            });
        }
        tracing::info!(
            template = pattern.template(),
            methods = ?methods.iter().map(Method::as_str).collect::<Vec<_>>(),
            "Route registered"
        );
        Ok(self)
    }

    pub fn get(&mut self, template: &str, handler: Handler) -> Result<&mut Self> {
        self.register(template, handler, &[Method::Get])
    }

    pub fn post(&mut self, template: &str, handler: Handler) -> Result<&mut Self> {
        self.register(template, handler, &[Method::Post])
    }

    /// Looks up the route for a request.
    ///
    /// # Arguments
    ///
    /// * `method` - The request method.
    /// * `path` - The normalized request path.
    ///
    /// # Returns
    ///
    /// The first entry, in registration order, whose method equals `method`
    /// and whose pattern matches all of `path`, with its captured variables.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
