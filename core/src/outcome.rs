use crate::token::Token;

/// The explicit result of one actor execution.
///
/// `Outcome` represents "Control Flow as Data": failures travel as
/// `Err(FlowError)`, everything else the director needs to know is here.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Tokens produced by this call, in production order. May be empty.
    Next(Vec<Token>),

    /// A source has no more data. Not an error.
    Exhausted,

    /// Deliberate termination of the whole flow. Not an error.
    Stop,
}

impl Outcome {
    pub fn none() -> Self {
        Outcome::Next(Vec::new())
    }

    pub fn one(token: Token) -> Self {
        Outcome::Next(vec![token])
    }
}

impl From<Token> for Outcome {
    fn from(token: Token) -> Self {
        Outcome::one(token)
    }
}

impl From<Option<Token>> for Outcome {
    fn from(token: Option<Token>) -> Self {
        match token {
            Some(token) => Outcome::one(token),
            None => Outcome::none(),
        }
    }
}
