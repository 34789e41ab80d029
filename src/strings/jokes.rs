//! # Jokes
//!
//! Knock-knock jokes told by the `knockknock` builtin.

#[derive(Debug, PartialEq, Eq)]
pub struct Joke {
    pub name: &'static str,
    pub punchline: &'static str,
}

pub const KNOCK_KNOCK: &[Joke] = &[
    Joke { name: "Lettuce", punchline: "Lettuce in, it's cold out here!" },
    Joke { name: "Atch", punchline: "Bless you!" },
    Joke { name: "Nobel", punchline: "Nobel, that's why I knocked!" },
    Joke { name: "Cow says", punchline: "No, a cow says moo!" },
    Joke { name: "Interrupting cow", punchline: "MOO!" },
    Joke { name: "Who", punchline: "‼️ That's the sound of da police ‼️" },
    Joke { name: "Boo", punchline: "Don't cry, it's just a joke!" },
    Joke { name: "Tank", punchline: "You're welcome!" },
    Joke { name: "Broken pencil", punchline: "Never mind, it's pointless." },
    Joke { name: "Dishes", punchline: "Dishes the police, open up!" },
    Joke { name: "Honey bee", punchline: "Honey bee a dear and open the door!" },
    Joke { name: "Ice cream", punchline: "Ice cream every time I see a scary movie!" },
    Joke { name: "Olive", punchline: "Olive you and I don't care who knows it!" },
    Joke { name: "Harry", punchline: "Harry up and answer the door!" },
    Joke { name: "Canoe", punchline: "Canoe help me with my homework?" },
    Joke { name: "Annie", punchline: "Annie thing you can do, I can do better!" },
    Joke { name: "Woo", punchline: "Don't get so excited, it's just a joke!" },
    Joke { name: "Déja", punchline: "Knock knock." },
    Joke { name: "Spell", punchline: "W-H-O" },
    Joke { name: "Yukon", punchline: "Yukon say that again!" },
    Joke { name: "Alpaca", punchline: "Alpaca the suitcase, you load the car!" },
    Joke { name: "Needle", punchline: "Needle little help getting in!" },
    Joke { name: "Butch", punchline: "Butch your arms around me!" },
    Joke { name: "Mikey", punchline: "Mikey doesn't fit in the lock!" },
    Joke { name: "Iva", punchline: "Iva sore hand from knocking!" },
    Joke { name: "Figs", punchline: "Figs the doorbell, it's broken!" },
    Joke { name: "Ketchup", punchline: "Ketchup with me and I'll tell you!" },
    Joke { name: "Wooden shoe", punchline: "Wooden shoe like to hear another joke?" },
    Joke { name: "Owls say", punchline: "Yes, they do!" },
    Joke { name: "To", punchline: "To whom." },
    Joke { name: "Banana", punchline: "Banana split, let's get out of here!" },
    Joke { name: "Justin", punchline: "Justin time for dinner!" },
    Joke { name: "Water", punchline: "Water you doing in my house?" },
    Joke { name: "Nana", punchline: "Nana your business!" },
    Joke { name: "Doris", punchline: "Doris locked, that's why I'm knocking!" },
    Joke { name: "Europe", punchline: "Europe next to open the door!" },
    Joke { name: "Abby", punchline: "Abby birthday to you!" },
    Joke { name: "Luke", punchline: "Luke through the peephole and find out!" },
    Joke { name: "Ash", punchline: "Ash you a question, but you might not like it!" },
    Joke { name: "Cargo", punchline: "Car go beep beep, vroom vroom!" },
    Joke { name: "Howard", punchline: "Howard I know? I forgot!" },
    Joke { name: "Wendy", punchline: "Wendy wind blows the cradle will rock!" },
    Joke { name: "Noah", punchline: "Noah good place to eat around here?" },
    Joke { name: "Al", punchline: "Al give you a hug if you open this door!" },
    Joke { name: "Cows go", punchline: "No they don't, cows go moo!" },
    Joke { name: "Stopwatch", punchline: "Stopwatch you're doing and open the door!" },
    Joke { name: "Radio", punchline: "Radio not, here I come!" },
];
