//! Specification documents used across the workspace tests.
//!
//! Each document is small enough for the built-in solver to enumerate in
//! milliseconds. Comments above each constant state what a correct run
//! produces.

/// `n` lamps in a row, exactly three on. The open query counts solutions,
/// so the answer is `C(n, 3)`.
pub const LAMPS: &str = r#"
custom_operator:
  count_on: "lambda xs: Sum([If(x, 1, 0) for x in xs])"
variables:
  n: {type: int, domain: "[3, 5]"}
symbols:
  lamp: {source: ["range(n)"], type: bool}
conditions:
  three_on:
    formula: "count_on([lamp[i] for i in range(n)]) == 3"
    desc: "Exactly three lamps are on.\n"
queries:
  count:
    desc: "How many arrangements are possible?"
    ans_formula: "len(_solutions)"
    ans_assertion: "_ans >= 1"
    ans_text: "_ans"
desc: "There are {n} lamps in a row.\n{conditions}{queries}"
"#;

/// Five distinct unordered pairs drawn from `range(6)`, none summing to 5.
pub const PAIRS: &str = r#"
variables:
  k: {formula: "5"}
symbols:
  pairs:
    source: ["range(6)"]
    amount: ["2"]
    order: [false]
    domain: "k"
    formula: "_sym[0]"
    desc: "{_sym[0][0]}&{_sym[0][1]}"
    custom_cond:
      - scope: dim
        constraint: "lambda s: s[0][0][0] + s[0][0][1] != 5"
calc_solution: false
queries:
  size:
    desc: "How many pairs are listed?"
    ans_formula: "len(pairs)"
    ans_assertion: "_ans == k"
    ans_text: "_ans"
desc: "Pairs: {get_desc(pairs)}\n{queries}"
"#;

/// One light of four is on, and only light 3 can be it. The correct option
/// is always `light 3`.
pub const SELECTION: &str = r#"
variables:
  n: {formula: "4"}
symbols:
  light: {source: ["range(n)"], type: bool}
conditions:
  only_one:
    formula: "Sum([If(light[i], 1, 0) for i in range(n)]) == 1"
    desc: "Exactly one light is on.\n"
  low_off:
    formula: "And(Not(light[0]), Not(light[1]), Not(light[2]))"
    desc: "Lights 0, 1 and 2 are off.\n"
queries:
  which:
    desc: "Which light is on?"
    source: ["range(n)"]
    opt_formula: "_model[light[_opt[0][0]]]"
    opt_text: "light {_opt[0][0]}"
desc: "{conditions}{queries}"
"#;

/// Options drawn from two templates. Exactly one drawn option is true.
pub const MULTI_SELECTION: &str = r#"
variables:
  n: {formula: "4"}
symbols:
  light: {source: ["range(n)"], type: bool}
conditions:
  only_last:
    formula: "And(Not(light[0]), Not(light[1]), Not(light[2]), light[3])"
queries:
  which:
    desc: "Which statement is true?"
    templates:
      - source: ["range(n)"]
        opt_formula: "_model[light[_opt[0][0]]]"
        opt_text: "light {_opt[0][0]} is on"
        domain: "[0, 4]"
      - source: ["range(n)"]
        opt_formula: "Not(_model[light[_opt[0][0]]])"
        opt_text: "light {_opt[0][0]} is off"
        domain: "[0, 4]"
desc: "{queries}"
"#;

/// Maximizing `3a + b` under `a + b <= 7` has the single optimum a=5, b=2.
pub const OPTIMIZE_UNIQUE: &str = r#"
variables:
  cap: {formula: "7"}
symbols:
  x: {source: ["range(2)"], type: int, domain: "[0, 5]"}
conditions:
  budget:
    formula: "x[0] + x[1] <= cap"
    desc: "The two amounts add up to at most {cap}.\n"
optimize:
  type: maximize
  formula: "3 * x[0] + x[1]"
queries:
  first:
    desc: "What is the first amount?"
    ans_formula: "_solutions[0][x[0]]"
    ans_assertion: "_ans == 5"
    ans_text: "_ans"
desc: "{conditions}{queries}"
"#;

/// Maximizing `a + b` under `a + b <= 7` has several optima.
pub const OPTIMIZE_AMBIGUOUS: &str = r#"
variables:
  cap: {formula: "7"}
symbols:
  x: {source: ["range(2)"], type: int, domain: "[0, 5]"}
conditions:
  budget: {formula: "x[0] + x[1] <= cap"}
optimize:
  type: maximize
  formula: "x[0] + x[1]"
desc: "ambiguous"
"#;

/// Three distinct values in 1..=3. Post-generation pins the first value to
/// the baseline and orders the other two, leaving one solution.
pub const POST_GENERATION: &str = r#"
variables:
  n: {formula: "3"}
symbols:
  v: {source: ["range(n)"], type: int, domain: "[1, 3]"}
conditions:
  distinct:
    formula: "Distinct([v[i] for i in range(n)])"
    desc: "All values differ.\n"
post_generation:
  post_gen_vars:
    first: "_sol[v[0]]"
  post_gen_conditions:
    pin: {formula: "v[0] == first", desc: "Value 0 is {first}"}
    order: {formula: "v[1] < v[2]", desc: "Value 1 is below value 2"}
queries:
  values:
    desc: "List the values."
    ans_formula: "get_value(_solutions[0], [v[i] for i in range(n)])"
    ans_text: "_ans"
desc: "{conditions}{post_gen_conditions}\n{queries}"
"#;

/// Two or three randomly chosen bulbs are forced off; at least one bulb is
/// on. With `d` forced off there are `2^(4-d) - 1` solutions.
pub const DYNAMIC_CONDITION: &str = r#"
variables:
  n: {formula: "4"}
symbols:
  bulb: {source: ["range(n)"], type: bool}
conditions:
  hints:
    source: ["range(n)"]
    domain: "[2, 3]"
    formula: "Not(bulb[_sym[0]])"
    desc: "Bulb {_sym[0]} is off. "
  some_on:
    formula: "Or([bulb[i] for i in range(n)])"
    desc: "At least one bulb is on.\n"
queries:
  count:
    desc: "How many arrangements remain?"
    ans_formula: "len(_solutions)"
    ans_assertion: "_ans == 2 ** (n - len(get_data(hints))) - 1"
    ans_text: "_ans"
desc: "{conditions}\n{queries}"
"#;

/// Four items split between letters and numbers.
pub const GROUP: &str = r#"
variables:
  total: {formula: "4"}
symbols:
  items:
    total: "total"
    templates:
      - source: ["['a', 'b', 'c']"]
        domain: "[1, 3]"
        desc: "letter {_sym[0]}"
      - source: ["range(10, 15)"]
        domain: "[1, 3]"
        desc: "number {_sym[0]}"
calc_solution: false
queries:
  count:
    desc: "How many items are there?"
    ans_formula: "len(items)"
    ans_assertion: "_ans == total"
    ans_text: "_ans"
desc: "Items: {get_desc(items)}\n{queries}"
"#;

/// A bool variable without a domain and a spec-controlled variable.
pub const FLAGS: &str = r#"
variables:
  flag: {type: bool}
  size: {type: int, domain: "[2, 9]"}
  double: {formula: "size * 2"}
calc_solution: false
desc: "flag={flag} size={size} double={double}"
"#;

/// Every fixture, by name.
pub const ALL: &[(&str, &str)] = &[
    ("lamps", LAMPS),
    ("pairs", PAIRS),
    ("selection", SELECTION),
    ("multi_selection", MULTI_SELECTION),
    ("optimize_unique", OPTIMIZE_UNIQUE),
    ("optimize_ambiguous", OPTIMIZE_AMBIGUOUS),
    ("post_generation", POST_GENERATION),
    ("dynamic_condition", DYNAMIC_CONDITION),
    ("group", GROUP),
    ("flags", FLAGS),
];
