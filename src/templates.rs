use maud::{DOCTYPE, Markup, html};

use crate::{agent::ToolStep, models::ChatTurn};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

const EXAMPLE_QUESTIONS: &[&str] = &[
    "Who played in Casino?",
    "What genres is Toy Story?",
    "Can you recommend a movie similar to \"Heat\"?",
];

pub fn index_page(history: &[ChatTurn], last_steps: &[ToolStep]) -> String {
    page(
        "Movie agent",
        html! {
            div class="min-h-screen bg-gray-50" {
                div class="max-w-3xl mx-auto px-6 py-12" {
                    div class="flex items-start justify-between gap-6" {
                        div {
                            h1 class="text-3xl font-bold text-gray-900" { "Movie agent" }
                            p class="mt-2 text-gray-600" { "Ask about actors and movies, or ask for a recommendation." }
                        }
                        form method="post" action="/reset" {
                            button class="text-sm text-blue-600 hover:text-blue-800" type="submit" { "New conversation" }
                        }
                    }

                    div class="mt-8 space-y-4" {
                        @if history.is_empty() {
                            div class="bg-white shadow rounded-lg p-6" {
                                p class="text-gray-600" { "Try one of these:" }
                                ul class="mt-2 space-y-1" {
                                    @for q in EXAMPLE_QUESTIONS {
                                        li class="text-sm text-gray-700" { (q) }
                                    }
                                }
                            }
                        }
                        @for turn in history {
                            (turn_card(turn))
                        }
                        @if !last_steps.is_empty() {
                            (steps_list(last_steps))
                        }
                    }

                    form class="mt-8 flex gap-3" method="post" action="/chat" {
                        input class="flex-1 rounded-md border border-gray-300 px-3 py-2 focus:border-blue-500 focus:outline-none focus:ring-1 focus:ring-blue-500" name="message" id="message" placeholder="Ask a question" autofocus required;
                        button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Send" }
                    }
                }
            }
        },
    )
}

pub fn error_page(message: String) -> String {
    page(
        "Error",
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { "Error" }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
                    }
                }
            }
        },
    )
}

fn page(title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script src=(TAILWIND_CDN) {}
            }
            body { (body) }
        }
    }
    .into_string()
}

fn turn_card(turn: &ChatTurn) -> Markup {
    html! {
        div class="bg-white shadow rounded-lg p-6" {
            p class="text-sm font-semibold text-gray-900" { (turn.question) }
            p class="mt-3 whitespace-pre-line text-gray-700" { (turn.answer) }
        }
    }
}

fn steps_list(steps: &[ToolStep]) -> Markup {
    html! {
        details class="bg-white shadow rounded-lg p-6" {
            summary class="text-sm font-semibold text-gray-700 cursor-pointer" { "Tools used for the last answer" }
            ul class="mt-3 space-y-3" {
                @for step in steps {
                    li class="border-l-4 border-purple-500 pl-4" {
                        p class="text-sm font-medium text-gray-900" {
                            (step.tool.name()) " · "
                            a class="text-blue-600 hover:text-blue-800" href=(api_link(step)) { (step.input) }
                        }
                        pre class="mt-1 text-xs text-gray-600 whitespace-pre-wrap" { (step.output) }
                    }
                }
            }
        }
    }
}

fn api_link(step: &ToolStep) -> String {
    let path = match step.tool {
        crate::semantic::Tool::Search => "/api/search",
        crate::semantic::Tool::Recommender => "/api/recommend",
    };
    format!("{}?q={}", path, urlencoding::encode(&step.input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::Tool;

    #[test]
    fn index_lists_turns_and_escapes_them() {
        let history = vec![ChatTurn { question: "<b>Casino</b>?".into(), answer: "Heat".into() }];
        let html = index_page(&history, &[]);
        assert!(html.contains("&lt;b&gt;Casino&lt;/b&gt;?"));
        assert!(html.contains("Heat"));
        assert!(!html.contains("Try one of these"));
    }

    #[test]
    fn steps_link_to_the_json_api() {
        let steps = vec![ToolStep { tool: Tool::Recommender, input: "Toy Story".into(), output: "Heat".into() }];
        let html = index_page(&[], &steps);
        assert!(html.contains("/api/recommend?q=Toy%20Story"));
    }
}
