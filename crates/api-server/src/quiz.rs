//! Fixed investing quiz.

use serde::Serialize;

pub struct QuizQuestion {
    pub question: &'static str,
    pub options: [&'static str; 3],
    pub answer: &'static str,
}

/// Question as shown to the player, without its answer.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub question: &'static str,
    pub options: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizScore {
    pub score: usize,
    pub total: usize,
}

pub const QUESTIONS: [QuizQuestion; 8] = [
    QuizQuestion {
        question: "What does IPO stand for?",
        options: ["Initial Public Offering", "International Price Order", "Investment Portfolio Option"],
        answer: "Initial Public Offering",
    },
    QuizQuestion {
        question: "Which is a cryptocurrency?",
        options: ["AAPL", "BTC", "TSLA"],
        answer: "BTC",
    },
    QuizQuestion {
        question: "What is a stock symbol?",
        options: ["A unique code for a company", "A type of bond", "A trading strategy"],
        answer: "A unique code for a company",
    },
    QuizQuestion {
        question: "Which market is known for technology stocks?",
        options: ["NASDAQ", "NYSE", "BSE"],
        answer: "NASDAQ",
    },
    QuizQuestion {
        question: "What does 'bull market' mean?",
        options: ["Rising prices", "Falling prices", "Stable prices"],
        answer: "Rising prices",
    },
    QuizQuestion {
        question: "Which company is NOT a tech company?",
        options: ["Apple", "Tesla", "Coca-Cola"],
        answer: "Coca-Cola",
    },
    QuizQuestion {
        question: "What is diversification?",
        options: ["Investing in one stock", "Spreading investments", "Selling all assets"],
        answer: "Spreading investments",
    },
    QuizQuestion {
        question: "Which is a type of order in trading?",
        options: ["Limit order", "Stop order", "Both of the above"],
        answer: "Both of the above",
    },
];

pub fn public_questions() -> Vec<PublicQuestion> {
    QUESTIONS
        .iter()
        .map(|q| PublicQuestion {
            question: q.question,
            options: q.options.to_vec(),
        })
        .collect()
}

/// Count answers matching the question at the same position exactly.
///
/// Missing answers count as wrong; extra answers are ignored.
pub fn score_answers(answers: &[Option<String>]) -> QuizScore {
    let score = QUESTIONS
        .iter()
        .zip(answers)
        .filter(|(q, answer)| answer.as_deref() == Some(q.answer))
        .count();

    QuizScore {
        score,
        total: QUESTIONS.len(),
    }
}
